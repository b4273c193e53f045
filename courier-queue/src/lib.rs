//! Reliable job queue over a key-value store.
//!
//! Provides an at-least-once job queue with:
//! - 📦 Redis-backed persistence (or an in-process store)
//! - ⏰ Delayed jobs
//! - 🔒 Leased reservations that come back if a worker dies
//! - 🔄 Retries with exponential backoff
//! - 🎯 Multiple queues
//! - 👷 Worker pools
//!
//! Each queue `q` lives in three keys: the ready list `queues:q`, the delayed
//! set `queues:q:delayed` and the reserved set `queues:q:reserved`. Sorted-set
//! scores are Unix seconds. Every pop first moves due delayed jobs and expired
//! reservations back onto the ready list.
//!
//! ## Quick Start
//!
//! ```
//! use courier_queue::*;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> QueueResult<()> {
//! let queue = Queue::new(MemoryStore::new());
//!
//! queue.push("send_welcome", json!({"to": "user@example.com"}), None).await?;
//!
//! let job = queue.pop(None).await?.expect("a job is ready");
//! assert_eq!(job.job_type(), "send_welcome");
//!
//! // Acknowledge it once handled
//! queue.delete_reserved(&job.queue, &job.raw).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Delayed Jobs and Leases
//!
//! ```
//! use courier_queue::*;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> QueueResult<()> {
//! let clock = ManualClock::new(1_700_000_000);
//! let queue = Queue::new(MemoryStore::new()).with_clock(clock.clone());
//!
//! queue.push_delayed(Duration::from_secs(30), "reminder", json!({}), None).await?;
//! assert!(queue.pop(None).await?.is_none());
//!
//! clock.advance(Duration::from_secs(30));
//! let job = queue.pop(None).await?.expect("due now");
//!
//! // Not acknowledged within the lease: handed out again
//! clock.advance(Duration::from_secs(60));
//! let again = queue.pop(None).await?.expect("lease expired");
//! assert_eq!(job.id(), again.id());
//! # Ok(())
//! # }
//! ```
//!
//! ## Queue Configuration
//!
//! ```
//! use courier_queue::QueueConfig;
//! use std::time::Duration;
//!
//! let config = QueueConfig::new("emails")
//!     .with_key_prefix("myapp:")
//!     .with_lease_window(Duration::from_secs(300));
//!
//! assert_eq!(config.keys("emails").delayed, "myapp:emails:delayed");
//! ```
//!
//! ## Complete Example
//!
//! ```no_run
//! use courier_queue::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), QueueError> {
//!     let queue = Queue::connect("redis://localhost:6379", "default").await?;
//!
//!     queue.push(
//!         "send_email",
//!         serde_json::json!({
//!             "to": "user@example.com",
//!             "subject": "Hello"
//!         }),
//!         None,
//!     ).await?;
//!
//!     let mut worker = Worker::new(queue);
//!     worker.register_handler("send_email", |job| async move {
//!         // Send email logic
//!         Ok(())
//!     });
//!
//!     worker.start().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod error;
pub mod job;
pub mod keys;
pub mod migrate;
pub mod payload;
pub mod queue;
pub mod store;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{QueueError, QueueResult};
pub use job::{Job, JobState};
pub use keys::QueueKeys;
pub use migrate::migrate_expired;
pub use payload::{JobData, JobId, Payload};
pub use queue::{JobQueue, Queue, QueueConfig};
pub use store::{MemoryStore, RedisStore, Store, StoreConnection};
pub use worker::{JobHandler, JobOutcome, Worker, WorkerConfig};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::{QueueError, QueueResult};
    pub use crate::job::{Job, JobState};
    pub use crate::payload::{JobData, JobId, Payload};
    pub use crate::queue::{JobQueue, Queue, QueueConfig};
    pub use crate::store::{MemoryStore, RedisStore, Store};
    pub use crate::worker::{JobHandler, JobOutcome, Worker, WorkerConfig};
}
