//! Error types for queue operations.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-specific errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing store could not be reached or rejected a command
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// An optimistic transaction kept losing to concurrent writers
    #[error("Transaction conflict on '{key}' after {attempts} attempts")]
    TransactionConflict {
        /// Watched key that kept changing
        key: String,
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Payload could not be parsed
    #[error("Payload decode error: {0}")]
    Decode(String),

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Job execution failed
    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),

    /// No handler registered for job type
    #[error("No handler registered for job type: {0}")]
    NoHandler(String),

    /// Worker not running
    #[error("Worker not running")]
    WorkerNotRunning,

    /// Worker already running
    #[error("Worker already running")]
    WorkerAlreadyRunning,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout error
    #[error("Operation timeout")]
    Timeout,
}

impl QueueError {
    /// Check if retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::TransactionConflict { .. } | Self::Timeout
        )
    }
}

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<courier_redis::RedisError> for QueueError {
    fn from(err: courier_redis::RedisError) -> Self {
        match err {
            courier_redis::RedisError::Config(msg) => Self::Config(msg),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}
