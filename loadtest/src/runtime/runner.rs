//! Run orchestration: setup, ramping execution, teardown, thresholds

use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::executor::{ExecutorConfig, RampingVus};
use super::metrics::MetricsRegistry;
use super::scenario::{Scenario, ScenarioOptions};
use super::stage::StageProfile;
use super::summary::RunReport;
use super::types::LoadTestError;
use super::vu::SetupContext;
use crate::config::Config;

/// Runs scenarios against the configured target
pub struct Runner {
    config: Config,
    client: Client,
}

impl Runner {
    pub fn new(config: Config) -> Result<Self, LoadTestError> {
        if !config.think_time_scale.is_finite() || config.think_time_scale < 0.0 {
            return Err(LoadTestError::InvalidConfig(format!(
                "think time scale must be a finite non-negative number, got {}",
                config.think_time_scale
            )));
        }
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scenario options after CLI/env overrides are applied
    pub fn effective_options<S: Scenario>(
        &self,
        scenario: &S,
    ) -> Result<ScenarioOptions, LoadTestError> {
        let mut options = scenario.options()?;
        if let Some(ref stages) = self.config.stages_override {
            options.profile = StageProfile::new(stages.clone())
                .with_interpolation(options.profile.interpolation())
                .with_start_vus(options.profile.start_vus());
        }
        if let Some(interpolation) = self.config.interpolation {
            options.profile = options.profile.with_interpolation(interpolation);
        }
        if let Some(start_vus) = self.config.start_vus {
            options.profile = options.profile.with_start_vus(start_vus);
        }
        options.profile.validate()?;
        if !self.config.thresholds_enabled {
            options.thresholds.clear();
        }
        Ok(options)
    }

    /// Execute a full run.
    ///
    /// Returns `Err` only if the run could not start (invalid options or a
    /// failed setup). Threshold breaches are reported in the `RunReport`.
    pub async fn run<S: Scenario>(&self, scenario: S) -> Result<RunReport, LoadTestError> {
        let options = self.effective_options(&scenario)?;
        let run_id = Uuid::new_v4();
        let metrics = Arc::new(MetricsRegistry::new());
        let setup_ctx = SetupContext::new(self.client.clone(), &self.config.base_url);

        info!(
            "Run {} of '{}' against {} ({})",
            run_id,
            scenario.name(),
            setup_ctx.base_url(),
            options.profile
        );

        let data = scenario.setup(&setup_ctx).await?;
        let started_at = Utc::now();
        let start = Instant::now();

        let scenario = Arc::new(scenario);
        let data = Arc::new(data);
        let executor = RampingVus::new(
            scenario.clone(),
            data.clone(),
            options.profile.clone(),
            self.client.clone(),
            &self.config.base_url,
            metrics.clone(),
            ExecutorConfig {
                tick: self.config.tick,
                graceful_stop: self.config.graceful_stop,
                think_time_scale: self.config.think_time_scale,
            },
        );
        let stats = executor.run().await;

        scenario.teardown(&setup_ctx, &data).await;
        let elapsed = start.elapsed();

        let thresholds = options
            .thresholds
            .iter()
            .map(|t| t.evaluate(&metrics, elapsed))
            .collect();

        Ok(RunReport::new(
            run_id,
            scenario.name(),
            setup_ctx.base_url(),
            started_at,
            elapsed,
            stats,
            &metrics,
            thresholds,
        ))
    }
}
