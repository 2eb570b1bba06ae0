//! Staged virtual-user runtime
//!
//! Schedules VU tasks along a stage profile, records request and custom
//! metrics, and evaluates thresholds when the run ends.

pub mod executor;
pub mod http;
pub mod metrics;
pub mod runner;
pub mod scenario;
pub mod stage;
pub mod summary;
pub mod threshold;
pub mod types;
pub mod vu;

pub use executor::{ExecutionStats, ExecutorConfig, RampingVus};
pub use http::{HttpResponse, HttpSession};
pub use metrics::{MetricKind, MetricValues, MetricsRegistry, TrendValues, builtin};
pub use runner::Runner;
pub use scenario::{Scenario, ScenarioOptions};
pub use stage::{Interpolation, Stage, StageProfile, parse_duration};
pub use summary::RunReport;
pub use threshold::{Threshold, ThresholdResult};
pub use types::{EXIT_GENERIC_ERROR, EXIT_SCRIPT_ABORTED, EXIT_THRESHOLDS_FAILED, LoadTestError};
pub use vu::{SetupContext, VuContext};
