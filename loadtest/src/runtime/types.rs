//! Runtime error definitions and exit codes

use thiserror::Error;

/// Exit code when one or more thresholds were crossed
pub const EXIT_THRESHOLDS_FAILED: u8 = 99;
/// Exit code when setup aborted the run before any load was generated
pub const EXIT_SCRIPT_ABORTED: u8 = 107;
/// Exit code for any other failure
pub const EXIT_GENERIC_ERROR: u8 = 1;

/// Errors that can occur while preparing or running a scenario
#[derive(Debug, Error)]
pub enum LoadTestError {
    #[error("App not reachable: {status}")]
    TargetUnreachable { status: u16 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadTestError {
    /// Process exit code this error maps to
    pub fn exit_code(&self) -> u8 {
        match self {
            LoadTestError::TargetUnreachable { .. } => EXIT_SCRIPT_ABORTED,
            _ => EXIT_GENERIC_ERROR,
        }
    }
}
