//! Built-in scenarios against the chat application

pub mod load;
pub mod spike;
pub mod stress;
pub mod types;

use clap::ValueEnum;
use std::fmt;

use crate::runtime::{LoadTestError, RunReport, Runner, Scenario, ScenarioOptions};

pub use load::{LoadTest, LoadTestData};
pub use spike::SpikeTest;
pub use stress::StressTest;

/// Scenario selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioKind {
    /// Staged ramp to 100 VUs over health, readiness and messaging
    Load,
    /// Sudden jump to 500 VUs on the health endpoint
    Spike,
    /// Climb to 400 VUs to find the breaking point
    Stress,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 3] = [Self::Load, Self::Spike, Self::Stress];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Load => LoadTest.name(),
            Self::Spike => SpikeTest.name(),
            Self::Stress => StressTest.name(),
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run the selected scenario to completion
pub async fn run(runner: &Runner, kind: ScenarioKind) -> Result<RunReport, LoadTestError> {
    match kind {
        ScenarioKind::Load => runner.run(LoadTest).await,
        ScenarioKind::Spike => runner.run(SpikeTest).await,
        ScenarioKind::Stress => runner.run(StressTest).await,
    }
}

/// Options the selected scenario would run with, overrides applied
pub fn describe(runner: &Runner, kind: ScenarioKind) -> Result<ScenarioOptions, LoadTestError> {
    match kind {
        ScenarioKind::Load => runner.effective_options(&LoadTest),
        ScenarioKind::Spike => runner.effective_options(&SpikeTest),
        ScenarioKind::Stress => runner.effective_options(&StressTest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::runtime::{Interpolation, Stage};
    use std::time::Duration;

    #[test]
    fn test_kind_names_match_scenarios() {
        let names: Vec<String> = ScenarioKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["load", "spike", "stress"]);

        let parsed = ScenarioKind::from_str("spike", true).unwrap();
        assert_eq!(parsed, ScenarioKind::Spike);
    }

    #[test]
    fn test_describe_applies_overrides() {
        let config = Config {
            stages_override: Some(vec!["5s:3".parse::<Stage>().unwrap()]),
            thresholds_enabled: false,
            ..Config::default()
        };
        let runner = Runner::new(config).unwrap();

        let options = describe(&runner, ScenarioKind::Load).unwrap();
        assert_eq!(options.profile.total_duration(), Duration::from_secs(5));
        assert_eq!(options.profile.max_target(), 3);
        assert!(options.thresholds.is_empty());
    }

    #[test]
    fn test_step_interpolation_starts_each_stage_at_its_target() {
        let config = Config {
            interpolation: Some(Interpolation::Step),
            ..Config::default()
        };
        let runner = Runner::new(config).unwrap();

        for kind in ScenarioKind::ALL {
            let profile = describe(&runner, kind).unwrap().profile;
            assert_eq!(profile.interpolation(), Interpolation::Step);
            for (start, stage) in profile.stage_starts().iter().zip(profile.stages()) {
                assert_eq!(
                    profile.target_at(*start),
                    stage.target,
                    "{} stage {} starting at {:?}",
                    kind,
                    stage,
                    start
                );
            }
        }
    }

    #[test]
    fn test_describe_without_overrides() {
        let runner = Runner::new(Config::default()).unwrap();
        for kind in ScenarioKind::ALL {
            let options = describe(&runner, kind).unwrap();
            assert!(options.profile.total_duration() >= Duration::from_secs(120));
        }
    }
}
