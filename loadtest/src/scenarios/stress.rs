//! Stress test: keep adding VUs until the target degrades
//!
//! No checks and no thresholds; an operator reads the summary to find the
//! breaking point.

use async_trait::async_trait;
use std::time::Duration;

use crate::runtime::{LoadTestError, Scenario, ScenarioOptions, StageProfile, VuContext};

pub struct StressTest;

#[async_trait]
impl Scenario for StressTest {
    type Data = ();

    fn name(&self) -> &'static str {
        "stress"
    }

    fn options(&self) -> Result<ScenarioOptions, LoadTestError> {
        let profile = StageProfile::parse(&[
            ("2m", 100), // Normal load
            ("5m", 200),
            ("5m", 300),
            ("5m", 400), // Break point?
            ("2m", 0),   // Recovery
        ])?;
        Ok(ScenarioOptions::new(profile))
    }

    async fn iteration(&self, vu: &mut VuContext, _data: &()) -> Result<(), LoadTestError> {
        vu.get("/health").await;
        vu.sleep(Duration::from_secs(1)).await;
        Ok(())
    }
}
