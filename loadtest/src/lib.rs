//! chatload library
//!
//! Staged virtual-user load generation against the chat application. The
//! binary drives the built-in scenarios; integration tests use the library
//! directly against an in-process mock target.

pub mod config;
pub mod runtime;
pub mod scenarios;

// Re-export commonly used types
pub use config::Config;
pub use runtime::{LoadTestError, RunReport, Runner, Scenario, ScenarioOptions};
pub use scenarios::ScenarioKind;
