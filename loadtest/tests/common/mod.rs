//! Common Test Utilities for Integration Tests
//!
//! An in-process mock of the chat application, bound to an ephemeral port.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chatload::config::Config;
use chatload::runtime::Stage;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Behaviour of the mock endpoints, adjustable per test
pub struct MockBehaviour {
    pub health_status: AtomicU16,
    pub message_status: AtomicU16,
    pub ready_body: Mutex<Value>,
}

impl Default for MockBehaviour {
    fn default() -> Self {
        Self {
            health_status: AtomicU16::new(200),
            message_status: AtomicU16::new(201),
            ready_body: Mutex::new(json!({
                "services": {"redis": "ok", "mongo": "ok"}
            })),
        }
    }
}

#[derive(Default)]
pub struct MockState {
    pub behaviour: MockBehaviour,
    pub health_hits: AtomicU64,
    pub ready_hits: AtomicU64,
    pub message_hits: AtomicU64,
    pub messages: Mutex<Vec<Value>>,
}

type SharedState = Arc<MockState>;

async fn health(State(state): State<SharedState>) -> (StatusCode, Json<Value>) {
    state.health_hits.fetch_add(1, Ordering::SeqCst);
    let status = state.behaviour.health_status.load(Ordering::SeqCst);
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = if code.is_success() {
        json!({"status": "ok"})
    } else {
        json!({"status": "unavailable"})
    };
    (code, Json(body))
}

async fn ready(State(state): State<SharedState>) -> Json<Value> {
    state.ready_hits.fetch_add(1, Ordering::SeqCst);
    Json(state.behaviour.ready_body.lock().unwrap().clone())
}

async fn message(State(state): State<SharedState>, Json(body): Json<Value>) -> StatusCode {
    state.message_hits.fetch_add(1, Ordering::SeqCst);
    state.messages.lock().unwrap().push(body);
    let status = state.behaviour.message_status.load(Ordering::SeqCst);
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Mock chat application running on 127.0.0.1
pub struct MockTarget {
    pub base_url: String,
    pub state: SharedState,
}

impl MockTarget {
    /// Start a mock where every endpoint succeeds
    pub async fn start() -> Self {
        Self::start_with(MockBehaviour::default()).await
    }

    pub async fn start_with(behaviour: MockBehaviour) -> Self {
        let state = Arc::new(MockState {
            behaviour,
            ..Default::default()
        });

        let app = Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/api/message", post(message))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn message_hits(&self) -> u64 {
        self.state.message_hits.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<Value> {
        self.state.messages.lock().unwrap().clone()
    }
}

/// Runner configuration for a short run against `base_url`
///
/// Think time is scaled down so one iteration outlasts a tiny profile.
pub fn quick_config(base_url: &str, stages: &[&str], think_time_scale: f64) -> Config {
    Config {
        base_url: base_url.to_string(),
        tick: Duration::from_millis(5),
        graceful_stop: Duration::from_secs(10),
        think_time_scale,
        stages_override: Some(stages.iter().map(|s| s.parse::<Stage>().unwrap()).collect()),
        ..Config::default()
    }
}

/// Initialize test logging for detailed output
#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatload=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
