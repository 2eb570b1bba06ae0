//! Per-VU and setup contexts handed to scenario code

use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::http::{HttpResponse, HttpSession};
use super::metrics::MetricsRegistry;
use super::types::LoadTestError;

/// State owned by one virtual user for its whole lifetime
pub struct VuContext {
    id: u64,
    iteration: u64,
    http: HttpSession,
    metrics: Arc<MetricsRegistry>,
    think_time_scale: f64,
}

impl VuContext {
    /// `id` is 1-based
    pub fn new(
        id: u64,
        client: Client,
        base_url: &str,
        metrics: Arc<MetricsRegistry>,
        think_time_scale: f64,
    ) -> Self {
        Self {
            id,
            iteration: 0,
            http: HttpSession::recorded(client, base_url, metrics.clone()),
            metrics,
            think_time_scale,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Zero-based iteration counter of this VU
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    pub async fn get(&self, path: &str) -> HttpResponse {
        self.http.get(path).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<HttpResponse, LoadTestError> {
        self.http.post_json(path, body).await
    }

    /// Record a single named check, returning its outcome
    pub fn check(&self, name: &str, passed: bool) -> bool {
        self.metrics.record_check(name, passed);
        passed
    }

    /// Record every check in the group. Returns true only if all passed.
    pub fn check_all(&self, checks: &[(&str, bool)]) -> bool {
        checks
            .iter()
            .fold(true, |all, (name, passed)| self.check(name, *passed) && all)
    }

    /// Think time between requests, scaled by the configured factor
    pub async fn sleep(&self, duration: Duration) {
        match Duration::try_from_secs_f64(duration.as_secs_f64() * self.think_time_scale) {
            Ok(scaled) if !scaled.is_zero() => tokio::time::sleep(scaled).await,
            Ok(_) => {}
            Err(_) => warn!(
                "VU {} skipping think time: {:?} x {} is not a valid duration",
                self.id, duration, self.think_time_scale
            ),
        }
    }
}

/// Context for setup and teardown hooks. Requests made here are not recorded.
pub struct SetupContext {
    http: HttpSession,
}

impl SetupContext {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            http: HttpSession::unrecorded(client, base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    pub async fn get(&self, path: &str) -> HttpResponse {
        self.http.get(path).await
    }
}
