//! HTTP helper that records the built-in request metrics
//!
//! Transport failures never propagate out of a request: they come back as a
//! response with status 0, the same way a failed check does.

use bytes::Bytes;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::metrics::{MetricsRegistry, builtin};
use super::types::LoadTestError;

/// Response of a single request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    body: Bytes,
    error: Option<String>,
}

impl HttpResponse {
    /// HTTP status, or 0 if the request never got a response
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Transport error, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Parse the body as JSON, `None` if it is empty or does not match `T`
    pub fn json<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Whether the status is in the expected range (200-399)
    pub fn is_expected_status(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Request sender bound to a base URL
#[derive(Clone)]
pub struct HttpSession {
    client: Client,
    base_url: String,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl HttpSession {
    /// Session whose requests are recorded in `metrics`
    pub fn recorded(client: Client, base_url: &str, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            metrics: Some(metrics),
        }
    }

    /// Session whose requests leave no trace in any metric (used by setup/teardown)
    pub fn unrecorded(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            metrics: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a GET request
    pub async fn get(&self, path: &str) -> HttpResponse {
        let request = self.client.get(self.url(path));
        self.send(request).await
    }

    /// Send a POST request with a JSON body
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<HttpResponse, LoadTestError> {
        let payload = serde_json::to_vec(body)?;
        let request = self
            .client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        Ok(self.send(request).await)
    }

    async fn send(&self, request: RequestBuilder) -> HttpResponse {
        let start = Instant::now();
        let result = match request.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                match resp.bytes().await {
                    Ok(body) => (status, body, None),
                    Err(e) => (status, Bytes::new(), Some(e.to_string())),
                }
            }
            Err(e) => (0, Bytes::new(), Some(e.to_string())),
        };
        let duration = start.elapsed();
        let (status, body, error) = result;

        if let Some(ref e) = error {
            debug!("Request failed after {:?}: {}", duration, e);
        }

        let response = HttpResponse {
            status,
            body,
            error,
        };

        if let Some(ref metrics) = self.metrics {
            metrics.add_counter(builtin::HTTP_REQS, 1);
            metrics.add_trend(builtin::HTTP_REQ_DURATION, duration.as_secs_f64() * 1000.0);
            metrics.add_rate(
                builtin::HTTP_REQ_FAILED,
                response.error.is_some() || !response.is_expected_status(),
            );
        }

        response
    }
}
