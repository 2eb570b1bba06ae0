//! Request and response bodies of the chat application endpoints

use serde::{Deserialize, Serialize};

/// Room every generated message is sent to
pub const TEST_ROOM: &str = "test-room";

/// Body of `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthBody {
    pub status: Option<String>,
}

impl HealthBody {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

/// Body of `GET /ready`. Unknown services are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyBody {
    pub services: Option<ServiceStatuses>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceStatuses {
    pub redis: Option<String>,
    pub mongo: Option<String>,
}

impl ReadyBody {
    pub fn redis_ok(&self) -> bool {
        self.services
            .as_ref()
            .and_then(|s| s.redis.as_deref())
            == Some("ok")
    }

    pub fn mongo_ok(&self) -> bool {
        self.services
            .as_ref()
            .and_then(|s| s.mongo.as_deref())
            == Some("ok")
    }
}

/// Body of `POST /api/message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessagePayload {
    pub user: String,
    pub message: String,
    pub room: String,
}

impl MessagePayload {
    /// Payload for VU `vu` built at `timestamp_ms`
    pub fn new(vu: u64, timestamp_ms: i64) -> Self {
        Self {
            user: format!("user_{}", vu),
            message: format!("Test message {}", timestamp_ms),
            room: TEST_ROOM.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_payload_has_exactly_three_string_fields() {
        let payload = MessagePayload::new(42, 1_700_000_000_000);
        let value = serde_json::to_value(&payload).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 3);
        for field in ["user", "message", "room"] {
            assert!(object[field].is_string(), "{} should be a string", field);
        }
        assert_eq!(object["user"], "user_42");
        assert_eq!(object["message"], "Test message 1700000000000");
        assert_eq!(object["room"], "test-room");

        let decoded: MessagePayload = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_payload_rejects_extra_fields() {
        let value = json!({"user": "u", "message": "m", "room": "r", "extra": 1});
        assert!(serde_json::from_value::<MessagePayload>(value).is_err());
    }

    #[test]
    fn test_ready_body_missing_service_is_not_ok() {
        let body: ReadyBody =
            serde_json::from_value(json!({"services": {"redis": "ok"}})).unwrap();
        assert!(body.redis_ok());
        assert!(!body.mongo_ok());

        let body: ReadyBody = serde_json::from_value(json!({})).unwrap();
        assert!(!body.redis_ok());
        assert!(!body.mongo_ok());
    }

    #[test]
    fn test_ready_body_ignores_extra_services() {
        let body: ReadyBody = serde_json::from_value(json!({
            "services": {"redis": "ok", "mongo": "ok", "kafka": "degraded"}
        }))
        .unwrap();
        assert!(body.redis_ok() && body.mongo_ok());
    }

    #[test]
    fn test_health_body() {
        let ok: HealthBody = serde_json::from_value(json!({"status": "ok"})).unwrap();
        let degraded: HealthBody = serde_json::from_value(json!({"status": "degraded"})).unwrap();
        let empty: HealthBody = serde_json::from_value(Value::Object(Default::default())).unwrap();
        assert!(ok.is_ok());
        assert!(!degraded.is_ok());
        assert!(!empty.is_ok());
    }
}
