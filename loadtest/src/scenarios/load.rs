//! Load test: staged ramp to 100 VUs exercising health, readiness and messaging
//!
//! | Stage | Duration | Target |
//! |-------|----------|--------|
//! | Warm up    | 1m | 10  |
//! | Ramp up    | 3m | 50  |
//! | Peak load  | 2m | 100 |
//! | Scale down | 2m | 50  |
//! | Cool down  | 1m | 0   |

use async_trait::async_trait;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::types::{HealthBody, MessagePayload, ReadyBody};
use crate::runtime::{
    LoadTestError, Scenario, ScenarioOptions, SetupContext, StageProfile, VuContext,
};

/// Custom rate of request steps that failed at least one check
pub const ERRORS: &str = "errors";
/// Custom trend of message send latency in milliseconds
pub const MESSAGE_LATENCY: &str = "message_latency";

pub struct LoadTest;

/// Data produced by setup
#[derive(Debug, Default)]
pub struct LoadTestData {
    pub started: Option<Instant>,
}

impl LoadTest {
    fn record_errors(vu: &VuContext, ok: bool) {
        vu.metrics().add_rate(ERRORS, !ok);
    }
}

#[async_trait]
impl Scenario for LoadTest {
    type Data = LoadTestData;

    fn name(&self) -> &'static str {
        "load"
    }

    fn options(&self) -> Result<ScenarioOptions, LoadTestError> {
        let profile = StageProfile::parse(&[
            ("1m", 10),
            ("3m", 50),
            ("2m", 100),
            ("2m", 50),
            ("1m", 0),
        ])?;

        ScenarioOptions::new(profile)
            .threshold("http_req_duration", "p(95)<500")?
            .threshold("http_req_failed", "rate<0.01")?
            .threshold(ERRORS, "rate<0.05")
    }

    async fn setup(&self, ctx: &SetupContext) -> Result<LoadTestData, LoadTestError> {
        info!("Starting load test...");
        info!("Target URL: {}", ctx.base_url());

        let res = ctx.get("/health").await;
        if let Some(e) = res.error() {
            warn!("Health check request failed: {}", e);
        }
        if res.status() != 200 {
            return Err(LoadTestError::TargetUnreachable {
                status: res.status(),
            });
        }

        Ok(LoadTestData {
            started: Some(Instant::now()),
        })
    }

    async fn iteration(
        &self,
        vu: &mut VuContext,
        _data: &LoadTestData,
    ) -> Result<(), LoadTestError> {
        let health = vu.get("/health").await;
        let health_body = health.json::<HealthBody>();
        let ok = vu.check_all(&[
            ("health check status is 200", health.status() == 200),
            (
                "health check response is ok",
                health_body.is_some_and(|b| b.is_ok()),
            ),
        ]);
        Self::record_errors(vu, ok);

        vu.sleep(Duration::from_secs(1)).await;

        let ready = vu.get("/ready").await;
        let ready_body = ready.json::<ReadyBody>();
        let ok = vu.check_all(&[
            ("ready check status is 200", ready.status() == 200),
            (
                "redis service ok",
                ready_body.as_ref().is_some_and(|b| b.redis_ok()),
            ),
            (
                "mongo service ok",
                ready_body.as_ref().is_some_and(|b| b.mongo_ok()),
            ),
        ]);
        Self::record_errors(vu, ok);

        vu.sleep(Duration::from_secs(1)).await;

        let message_start = Instant::now();
        let payload = MessagePayload::new(vu.id(), Utc::now().timestamp_millis());
        let res = vu.post_json("/api/message", &payload).await?;
        vu.metrics().add_trend(
            MESSAGE_LATENCY,
            message_start.elapsed().as_secs_f64() * 1000.0,
        );

        let ok = vu.check(
            "message sent successfully",
            matches!(res.status(), 200 | 201),
        );
        Self::record_errors(vu, ok);

        vu.sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn teardown(&self, _ctx: &SetupContext, data: &LoadTestData) {
        if let Some(started) = data.started {
            info!(
                "Load test completed in {:.3}s",
                started.elapsed().as_secs_f64()
            );
        }
    }
}
