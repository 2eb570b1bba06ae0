//! Runner configuration
//!
//! Configuration is loaded from environment variables; CLI flags override
//! individual fields afterwards.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::runtime::{Interpolation, Stage};

/// Default target when `BASE_URL` is not set
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Main runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the application under test
    pub base_url: String,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// How long VUs get to finish once the profile ends
    pub graceful_stop: Duration,
    /// Scheduler tick
    pub tick: Duration,
    /// Multiplier for think-time sleeps (0 disables them)
    pub think_time_scale: f64,
    /// Replace the scenario's stages with these
    pub stages_override: Option<Vec<Stage>>,
    /// Replace the scenario's interpolation policy
    pub interpolation: Option<Interpolation>,
    /// VU count the first stage ramps from
    pub start_vus: Option<u32>,
    /// Whether declared thresholds are evaluated
    pub thresholds_enabled: bool,
    /// Write the end-of-test summary as JSON to this path
    pub summary_export: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(60),
            graceful_stop: Duration::from_secs(30),
            tick: Duration::from_millis(100),
            think_time_scale: 1.0,
            stages_override: None,
            interpolation: None,
            start_vus: None,
            thresholds_enabled: true,
            summary_export: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("BASE_URL")
            && !url.is_empty()
        {
            config.base_url = url;
        }
        if let Ok(val) = env::var("LOADTEST_HTTP_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("LOADTEST_GRACEFUL_STOP_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.graceful_stop = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("LOADTEST_TICK_MS")
            && let Ok(ms) = val.parse::<u64>()
            && ms > 0
        {
            config.tick = Duration::from_millis(ms);
        }
        if let Ok(val) = env::var("LOADTEST_THINK_TIME_SCALE")
            && let Some(scale) = parse_think_time_scale(&val)
        {
            config.think_time_scale = scale;
        }
        if let Ok(val) = env::var("LOADTEST_INTERPOLATION")
            && let Ok(interpolation) = val.parse::<Interpolation>()
        {
            config.interpolation = Some(interpolation);
        }
        if let Ok(val) = env::var("LOADTEST_START_VUS")
            && let Ok(vus) = val.parse::<u32>()
        {
            config.start_vus = Some(vus);
        }
        if let Ok(path) = env::var("LOADTEST_SUMMARY_EXPORT")
            && !path.is_empty()
        {
            config.summary_export = Some(PathBuf::from(path));
        }

        config
    }
}

/// Parse a think-time multiplier. Only finite, non-negative values are accepted.
pub fn parse_think_time_scale(val: &str) -> Option<f64> {
    val.trim()
        .parse::<f64>()
        .ok()
        .filter(|scale| scale.is_finite() && *scale >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.graceful_stop, Duration::from_secs(30));
        assert_eq!(config.think_time_scale, 1.0);
        assert!(config.thresholds_enabled);
        assert!(config.stages_override.is_none());
    }

    #[test]
    fn test_config_from_env() {
        // No LOADTEST_* variables are set in the test environment
        let config = Config::from_env();
        assert_eq!(config.tick, Duration::from_millis(100));
        assert!(config.summary_export.is_none());
        assert!(config.interpolation.is_none());
        assert!(config.start_vus.is_none());
    }

    #[test]
    fn test_think_time_scale_must_be_finite() {
        assert_eq!(parse_think_time_scale("0.5"), Some(0.5));
        assert_eq!(parse_think_time_scale("0"), Some(0.0));
        assert_eq!(parse_think_time_scale("inf"), None);
        assert_eq!(parse_think_time_scale("NaN"), None);
        assert_eq!(parse_think_time_scale("-1"), None);
        assert_eq!(parse_think_time_scale("fast"), None);
    }
}
