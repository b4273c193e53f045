//! Queue engine.

use crate::clock::{Clock, SystemClock, secs};
use crate::error::{QueueError, QueueResult};
use crate::job::{Job, JobState};
use crate::keys::QueueKeys;
use crate::migrate::{DEFAULT_RETRY_LIMIT, migrate_expired};
use crate::payload::{self, JobData, JobId, Payload};
use crate::store::{Batch, RedisStore, Store, StoreConnection};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_redis::RedisConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue used when an operation names none
    pub default_queue: String,

    /// Prepended to every queue name to form the ready-list key
    pub key_prefix: String,

    /// How long a popped job stays reserved before it is handed out again
    pub lease_window: Duration,

    /// Attempts a contended migration makes before failing
    pub retry_limit: u32,
}

impl QueueConfig {
    /// Create a new queue configuration.
    pub fn new(default_queue: impl Into<String>) -> Self {
        Self {
            default_queue: default_queue.into(),
            key_prefix: "queues:".to_string(),
            lease_window: Duration::from_secs(60),
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `COURIER_QUEUE`, `COURIER_KEY_PREFIX`, `COURIER_LEASE_SECONDS`
    /// and `COURIER_RETRY_LIMIT`; unset variables keep their defaults.
    pub fn from_env() -> QueueResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any variable source, keyed like
    /// [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> QueueResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(queue) = lookup("COURIER_QUEUE") {
            config.default_queue = queue;
        }

        if let Some(prefix) = lookup("COURIER_KEY_PREFIX") {
            config.key_prefix = prefix;
        }

        if let Some(lease) = lookup("COURIER_LEASE_SECONDS") {
            let secs = lease.parse().map_err(|_| {
                QueueError::Config(format!("COURIER_LEASE_SECONDS is not a number: {}", lease))
            })?;
            config.lease_window = Duration::from_secs(secs);
        }

        if let Some(limit) = lookup("COURIER_RETRY_LIMIT") {
            config.retry_limit = limit.parse().map_err(|_| {
                QueueError::Config(format!("COURIER_RETRY_LIMIT is not a number: {}", limit))
            })?;
        }

        Ok(config)
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the lease window.
    pub fn with_lease_window(mut self, lease_window: Duration) -> Self {
        self.lease_window = lease_window;
        self
    }

    /// Set the migration retry limit.
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Resolve an optional queue name against the default.
    pub fn queue_name<'a>(&'a self, queue: Option<&'a str>) -> &'a str {
        queue.unwrap_or(&self.default_queue)
    }

    /// Store keys for a queue.
    pub fn keys(&self, queue: &str) -> QueueKeys {
        QueueKeys::new(&self.key_prefix, queue)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Operations every queue backend offers.
///
/// `None` as a queue name means the configured default queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push a new job onto the ready list.
    async fn push(&self, job_type: &str, data: JobData, queue: Option<&str>)
    -> QueueResult<JobId>;

    /// Push an already encoded payload onto the ready list.
    async fn push_raw(&self, payload: &str, queue: Option<&str>) -> QueueResult<JobId>;

    /// Push a new job that becomes ready after `delay`.
    async fn push_delayed(
        &self,
        delay: Duration,
        job_type: &str,
        data: JobData,
        queue: Option<&str>,
    ) -> QueueResult<JobId>;

    /// Reserve the next ready job, first promoting due delayed jobs and
    /// expired reservations. Returns `None` when nothing is ready.
    async fn pop(&self, queue: Option<&str>) -> QueueResult<Option<Job>>;

    /// Put a reserved job back, to become ready after `delay`, recording
    /// `attempts` in its payload.
    async fn release(
        &self,
        queue: &str,
        payload: &str,
        delay: Duration,
        attempts: u32,
    ) -> QueueResult<()>;

    /// Acknowledge a reserved job so it is never handed out again.
    async fn delete_reserved(&self, queue: &str, payload: &str) -> QueueResult<()>;

    /// How long a popped job stays reserved before it is handed out again.
    fn lease_window(&self) -> Duration;
}

/// Job queue over a [`Store`].
///
/// Holds no job state itself; clones and separate processes sharing a store
/// cooperate through the store alone.
#[derive(Clone)]
pub struct Queue<S> {
    store: S,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
}

impl Queue<RedisStore> {
    /// Connect to Redis with default settings.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use courier_queue::*;
    ///
    /// # async fn example() -> QueueResult<()> {
    /// let queue = Queue::connect("redis://localhost:6379", "emails").await?;
    /// queue.push("send_welcome", serde_json::json!({"to": "user@example.com"}), None).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(
        redis_url: impl Into<String>,
        default_queue: impl Into<String>,
    ) -> QueueResult<Self> {
        Self::with_redis(RedisConfig::new(redis_url), QueueConfig::new(default_queue)).await
    }

    /// Connect to Redis with explicit settings.
    pub async fn with_redis(redis: RedisConfig, config: QueueConfig) -> QueueResult<Self> {
        let store = RedisStore::new(redis).await?;
        Ok(Self::with_config(store, config))
    }
}

impl<S: Store> Queue<S> {
    /// Create a queue with default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, QueueConfig::default())
    }

    /// Create a queue with custom configuration.
    pub fn with_config(store: S, config: QueueConfig) -> Self {
        info!(
            default_queue = %config.default_queue,
            prefix = %config.key_prefix,
            lease_secs = config.lease_window.as_secs(),
            "Job queue ready"
        );
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Get the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current time according to the queue's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Push a new job that becomes ready at `when`.
    ///
    /// Instants in the past make the job ready on the next pop.
    pub async fn push_at(
        &self,
        when: DateTime<Utc>,
        job_type: &str,
        data: JobData,
        queue: Option<&str>,
    ) -> QueueResult<JobId> {
        let seconds = (when.timestamp() - self.now()).max(0);
        let delay = Duration::from_secs(seconds.unsigned_abs());
        self.push_delayed(delay, job_type, data, queue).await
    }

    /// Number of jobs of a queue in the given state.
    pub async fn count(&self, queue: Option<&str>, state: JobState) -> QueueResult<u64> {
        let keys = self.config.keys(self.config.queue_name(queue));
        let mut conn = self.store.connection().await?;
        match state {
            JobState::Ready => conn.list_len(&keys.ready).await,
            JobState::Delayed => conn.scored_count(&keys.delayed).await,
            JobState::Reserved => conn.scored_count(&keys.reserved).await,
        }
    }

    /// Number of jobs ready to pop.
    pub async fn size(&self, queue: Option<&str>) -> QueueResult<u64> {
        self.count(queue, JobState::Ready).await
    }

    /// Number of jobs waiting for their delay to pass.
    pub async fn delayed_count(&self, queue: Option<&str>) -> QueueResult<u64> {
        self.count(queue, JobState::Delayed).await
    }

    /// Number of jobs currently leased to a worker.
    pub async fn reserved_count(&self, queue: Option<&str>) -> QueueResult<u64> {
        self.count(queue, JobState::Reserved).await
    }

    /// Remove every job of a queue, in any state.
    pub async fn clear(&self, queue: Option<&str>) -> QueueResult<()> {
        let name = self.config.queue_name(queue);
        let keys = self.config.keys(name);
        let mut conn = self.store.connection().await?;
        conn.delete(&keys.all()).await?;
        info!(queue = name, "Queue cleared");
        Ok(())
    }

    /// Move due members of the scored set `from` onto the list `to`.
    pub async fn migrate_expired(&self, from: &str, to: &str) -> QueueResult<usize> {
        let mut conn = self.store.connection().await?;
        migrate_expired(&mut conn, from, to, self.now(), self.config.retry_limit).await
    }

    async fn migrate_all_expired(
        &self,
        conn: &mut S::Connection,
        keys: &QueueKeys,
        now: i64,
    ) -> QueueResult<()> {
        let retry_limit = self.config.retry_limit;
        migrate_expired(conn, &keys.delayed, &keys.ready, now, retry_limit).await?;
        migrate_expired(conn, &keys.reserved, &keys.ready, now, retry_limit).await?;
        Ok(())
    }

    async fn push_encoded(&self, raw: &str, queue: &str) -> QueueResult<()> {
        let keys = self.config.keys(queue);
        let mut conn = self.store.connection().await?;
        conn.push_right(&keys.ready, &[raw.to_string()]).await
    }

    async fn push_encoded_delayed(&self, raw: &str, queue: &str, delay: Duration) -> QueueResult<()> {
        let keys = self.config.keys(queue);
        let due = self.now().saturating_add(secs(delay));
        let mut conn = self.store.connection().await?;
        conn.scored_add(&keys.delayed, due, raw).await
    }
}

#[async_trait]
impl<S: Store> JobQueue for Queue<S> {
    async fn push(
        &self,
        job_type: &str,
        data: JobData,
        queue: Option<&str>,
    ) -> QueueResult<JobId> {
        let queue = self.config.queue_name(queue);
        let payload = Payload::new(job_type, data);
        self.push_encoded(&payload.encode()?, queue).await?;

        debug!(queue, job_id = %payload.id, job_type, "Job pushed");
        Ok(payload.id)
    }

    async fn push_raw(&self, payload: &str, queue: Option<&str>) -> QueueResult<JobId> {
        let queue = self.config.queue_name(queue);
        let decoded = Payload::decode(payload)?;
        self.push_encoded(payload, queue).await?;

        debug!(queue, job_id = %decoded.id, "Raw payload pushed");
        Ok(decoded.id)
    }

    async fn push_delayed(
        &self,
        delay: Duration,
        job_type: &str,
        data: JobData,
        queue: Option<&str>,
    ) -> QueueResult<JobId> {
        let queue = self.config.queue_name(queue);
        let payload = Payload::new(job_type, data);
        self.push_encoded_delayed(&payload.encode()?, queue, delay)
            .await?;

        debug!(
            queue,
            job_id = %payload.id,
            job_type,
            delay_secs = delay.as_secs(),
            "Delayed job pushed"
        );
        Ok(payload.id)
    }

    async fn pop(&self, queue: Option<&str>) -> QueueResult<Option<Job>> {
        let queue = self.config.queue_name(queue);
        let keys = self.config.keys(queue);
        let mut conn = self.store.connection().await?;
        let now = self.now();

        self.migrate_all_expired(&mut conn, &keys, now).await?;

        let Some(raw) = conn.pop_left(&keys.ready).await? else {
            return Ok(None);
        };

        let expires_at = now.saturating_add(secs(self.config.lease_window));
        conn.scored_add(&keys.reserved, expires_at, &raw).await?;

        // Undecodable payloads stay reserved so they come back after the lease
        let job = Job::from_reserved(queue, raw).inspect_err(|err| {
            warn!(queue, error = %err, "Reserved a payload that does not decode");
        })?;

        debug!(
            queue,
            job_id = %job.id(),
            attempts = job.attempts(),
            expires_at,
            "Job reserved"
        );
        Ok(Some(job))
    }

    async fn release(
        &self,
        queue: &str,
        payload: &str,
        delay: Duration,
        attempts: u32,
    ) -> QueueResult<()> {
        let keys = self.config.keys(queue);
        let updated = payload::with_attempts(payload, attempts)?;
        let due = self.now().saturating_add(secs(delay));

        // Dropping the old reservation in the same batch keeps the lease
        // sweep from handing out a second copy
        let mut batch = Batch::new();
        batch
            .scored_remove(&keys.reserved, payload)
            .scored_add(&keys.delayed, due, &updated);

        let mut conn = self.store.connection().await?;
        if !conn.commit(&batch).await? {
            return Err(QueueError::TransactionConflict {
                key: keys.reserved,
                attempts: 1,
            });
        }

        debug!(queue, attempts, due, "Job released");
        Ok(())
    }

    async fn delete_reserved(&self, queue: &str, payload: &str) -> QueueResult<()> {
        let keys = self.config.keys(queue);
        let mut conn = self.store.connection().await?;
        let removed = conn.scored_remove(&keys.reserved, payload).await?;

        debug!(queue, removed, "Reserved job deleted");
        Ok(())
    }

    fn lease_window(&self) -> Duration {
        self.config.lease_window
    }
}
