//! Reserved job handle and job states.

use crate::error::QueueResult;
use crate::payload::{JobData, JobId, Payload};
use serde::{Deserialize, Serialize};

/// Where a payload currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// In the ready list, waiting for a worker
    Ready,
    /// In the delayed set, waiting for its due time
    Delayed,
    /// In the reserved set, handed to a worker until its lease expires
    Reserved,
}

/// A job handed out by `pop`.
///
/// The job stays in the reserved set until it is deleted or released. If
/// neither happens before the lease expires it becomes ready again.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Logical queue name the job was popped from
    pub queue: String,

    /// Exact stored payload; needed to delete or release the reservation
    pub raw: String,

    /// Decoded payload
    pub payload: Payload,
}

impl Job {
    /// Build a handle for a payload that has just been reserved.
    pub fn from_reserved(queue: impl Into<String>, raw: impl Into<String>) -> QueueResult<Self> {
        let raw = raw.into();
        let payload = Payload::decode(&raw)?;
        Ok(Self {
            queue: queue.into(),
            raw,
            payload,
        })
    }

    /// Job id.
    pub fn id(&self) -> &JobId {
        &self.payload.id
    }

    /// Handler name.
    pub fn job_type(&self) -> &str {
        &self.payload.job
    }

    /// Handler arguments.
    pub fn data(&self) -> &JobData {
        &self.payload.data
    }

    /// Attempt count recorded in the payload.
    pub fn attempts(&self) -> u32 {
        self.payload.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueueError;
    use serde_json::json;

    #[test]
    fn test_from_reserved() {
        let raw = Payload::new("send_email", json!({"to": "test@example.com"}))
            .with_id("42")
            .with_attempts(1)
            .encode()
            .unwrap();

        let job = Job::from_reserved("emails", raw.clone()).unwrap();
        assert_eq!(job.queue, "emails");
        assert_eq!(job.raw, raw);
        assert_eq!(job.id(), "42");
        assert_eq!(job.job_type(), "send_email");
        assert_eq!(job.data()["to"], "test@example.com");
        assert_eq!(job.attempts(), 1);
    }

    #[test]
    fn test_from_reserved_keeps_raw_verbatim() {
        // Deleting a reservation needs the exact stored string, not a re-encoding
        let raw = r#"{"job":"x","id":"1","attempts":0,"data":null}"#;
        let job = Job::from_reserved("default", raw).unwrap();
        assert_eq!(job.raw, raw);
    }

    #[test]
    fn test_from_reserved_decode_error() {
        let result = Job::from_reserved("default", "{broken");
        assert!(matches!(result, Err(QueueError::Decode(_))));
    }

    #[test]
    fn test_job_state_serialization() {
        let json = serde_json::to_string(&JobState::Reserved).unwrap();
        assert_eq!(json, "\"Reserved\"");
    }
}
