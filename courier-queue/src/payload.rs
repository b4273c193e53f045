//! Payload encoding.
//!
//! A payload is the string stored in the queue. It is a JSON object:
//!
//! ```json
//! {"id":"9f1c…","job":"send_email","data":{"to":"user@example.com"},"attempts":0}
//! ```
//!
//! The queue engine only reads `id` and `attempts` and only ever rewrites
//! `attempts`; everything else passes through untouched.

use crate::error::{QueueError, QueueResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Job unique identifier.
pub type JobId = String;

/// Job arguments.
pub type JobData = Value;

const ATTEMPTS_FIELD: &str = "attempts";

/// Decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Producer-assigned identifier, stable across releases
    pub id: JobId,

    /// Handler name
    pub job: String,

    /// Handler arguments
    #[serde(default)]
    pub data: JobData,

    /// Times the job has been released back after a failure
    #[serde(default)]
    pub attempts: u32,
}

impl Payload {
    /// Create a payload with a fresh id and no attempts.
    pub fn new(job: impl Into<String>, data: JobData) -> Self {
        Self {
            id: new_job_id(),
            job: job.into(),
            data,
            attempts: 0,
        }
    }

    /// Replace the generated id.
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the attempt count.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Serialize to the stored string form.
    pub fn encode(&self) -> QueueResult<String> {
        serde_json::to_string(self).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    /// Parse a stored payload.
    pub fn decode(raw: &str) -> QueueResult<Self> {
        serde_json::from_str(raw).map_err(|e| QueueError::Decode(e.to_string()))
    }
}

/// Generate a job id: 32 lowercase hex characters.
pub fn new_job_id() -> JobId {
    Uuid::new_v4().simple().to_string()
}

/// Rewrite the attempt count of a stored payload, keeping all other fields.
pub fn with_attempts(raw: &str, attempts: u32) -> QueueResult<String> {
    let mut object: Map<String, Value> =
        serde_json::from_str(raw).map_err(|e| QueueError::Decode(e.to_string()))?;
    object.insert(ATTEMPTS_FIELD.to_string(), Value::from(attempts));
    serde_json::to_string(&object).map_err(|e| QueueError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_payload() {
        let payload = Payload::new("send_email", json!({"to": "test@example.com"}));
        assert_eq!(payload.job, "send_email");
        assert_eq!(payload.attempts, 0);
        assert_eq!(payload.id.len(), 32);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Payload::new("task", json!({}));
        let b = Payload::new("task", json!({}));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_encode_decode() {
        let payload = Payload::new("resize", json!({"width": 640, "tags": ["a", "b"]}))
            .with_id("job-1")
            .with_attempts(2);
        let decoded = Payload::decode(&payload.encode().unwrap()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_decode_defaults_missing_fields() {
        let decoded = Payload::decode(r#"{"id":"abc","job":"cleanup"}"#).unwrap();
        assert_eq!(decoded.attempts, 0);
        assert!(decoded.data.is_null());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(Payload::decode("not json"), Err(QueueError::Decode(_))));
        assert!(matches!(Payload::decode(r#"{"job":"x"}"#), Err(QueueError::Decode(_))));
    }

    #[test]
    fn test_with_attempts_rewrites_only_attempts() {
        let raw = r#"{"id":"abc","job":"cleanup","data":{"n":1},"attempts":1,"tenant":"acme"}"#;
        let updated = with_attempts(raw, 4).unwrap();

        let value: Value = serde_json::from_str(&updated).unwrap();
        assert_eq!(value["attempts"], 4);
        assert_eq!(value["id"], "abc");
        assert_eq!(value["data"]["n"], 1);
        assert_eq!(value["tenant"], "acme");
    }

    #[test]
    fn test_with_attempts_adds_missing_field() {
        let updated = with_attempts(r#"{"id":"abc","job":"cleanup"}"#, 1).unwrap();
        assert_eq!(Payload::decode(&updated).unwrap().attempts, 1);
    }

    #[test]
    fn test_with_attempts_rejects_non_object() {
        assert!(matches!(with_attempts("[1,2]", 1), Err(QueueError::Decode(_))));
    }
}
