//! Scenario trait implemented by each test script

use async_trait::async_trait;

use super::stage::StageProfile;
use super::threshold::Threshold;
use super::types::LoadTestError;
use super::vu::{SetupContext, VuContext};

/// Declarative options a scenario hands to the runtime
#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    pub profile: StageProfile,
    pub thresholds: Vec<Threshold>,
}

impl ScenarioOptions {
    pub fn new(profile: StageProfile) -> Self {
        Self {
            profile,
            thresholds: Vec::new(),
        }
    }

    /// Add a threshold on `metric`
    pub fn threshold(mut self, metric: &str, expr: &str) -> Result<Self, LoadTestError> {
        self.thresholds.push(Threshold::parse(metric, expr)?);
        Ok(self)
    }
}

/// A load-test script: a stage profile plus the per-VU iteration body.
///
/// `setup` runs once before any VU starts and its result is shared by every
/// iteration and by `teardown`. An error from `setup` aborts the run.
/// An error from `iteration` is logged and the VU moves on to its next
/// iteration.
#[async_trait]
pub trait Scenario: Send + Sync + 'static {
    type Data: Default + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    fn options(&self) -> Result<ScenarioOptions, LoadTestError>;

    async fn setup(&self, _ctx: &SetupContext) -> Result<Self::Data, LoadTestError> {
        Ok(Self::Data::default())
    }

    async fn iteration(&self, vu: &mut VuContext, data: &Self::Data) -> Result<(), LoadTestError>;

    async fn teardown(&self, _ctx: &SetupContext, _data: &Self::Data) {}
}
