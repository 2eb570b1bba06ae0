//! Spike test: sudden jump from 10 to 500 VUs on the health endpoint
//!
//! Thresholds are relaxed compared to the load test since some
//! degradation is expected while the spike is held.

use async_trait::async_trait;
use std::time::Duration;

use crate::runtime::{LoadTestError, Scenario, ScenarioOptions, StageProfile, VuContext};

pub struct SpikeTest;

#[async_trait]
impl Scenario for SpikeTest {
    type Data = ();

    fn name(&self) -> &'static str {
        "spike"
    }

    fn options(&self) -> Result<ScenarioOptions, LoadTestError> {
        let profile = StageProfile::parse(&[
            ("10s", 10),  // Baseline
            ("10s", 500), // Spike
            ("1m", 500),  // Hold spike
            ("10s", 10),  // Recovery
            ("30s", 10),  // Observe recovery
        ])?;

        ScenarioOptions::new(profile)
            .threshold("http_req_duration", "p(95)<2000")?
            .threshold("http_req_failed", "rate<0.10")
    }

    async fn iteration(&self, vu: &mut VuContext, _data: &()) -> Result<(), LoadTestError> {
        let res = vu.get("/health").await;
        vu.check("status is 200", res.status() == 200);

        vu.sleep(Duration::from_millis(500)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spike_profile_spans_two_minutes() {
        let options = SpikeTest.options().unwrap();
        assert_eq!(options.profile.total_duration(), Duration::from_secs(120));
        assert_eq!(options.profile.max_target(), 500);
    }

    #[test]
    fn test_spike_holds_peak() {
        let options = SpikeTest.options().unwrap();
        let profile = &options.profile;
        assert_eq!(profile.target_at(Duration::from_secs(20)), 500);
        assert_eq!(profile.target_at(Duration::from_secs(50)), 500);
        assert_eq!(profile.target_at(Duration::from_secs(80)), 500);
        assert_eq!(profile.target_at(Duration::from_secs(90)), 10);
        assert_eq!(profile.target_at(Duration::from_secs(120)), 10);
    }

    #[test]
    fn test_spike_declares_relaxed_thresholds() {
        let options = SpikeTest.options().unwrap();
        let exprs: Vec<String> = options
            .thresholds
            .iter()
            .map(|t| format!("{}: {}", t.metric, t.expr))
            .collect();
        assert_eq!(
            exprs,
            vec!["http_req_duration: p(95)<2000", "http_req_failed: rate<0.1"]
        );
    }
}
