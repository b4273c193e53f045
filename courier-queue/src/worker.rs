//! Worker implementation for processing jobs.

use crate::error::{QueueError, QueueResult};
use crate::job::Job;
use crate::queue::JobQueue;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Job handler function type.
pub type JobHandler =
    Arc<dyn Fn(Job) -> Pin<Box<dyn Future<Output = QueueResult<()>> + Send>> + Send + Sync>;

type Handlers = Arc<HashMap<String, JobHandler>>;

/// Headroom left between a timed-out handler and lease expiry.
const LEASE_MARGIN: Duration = Duration::from_secs(1);

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent jobs to process
    pub concurrency: usize,

    /// Poll interval when the queue is empty or unreachable
    pub poll_interval: Duration,

    /// Timeout for job execution; capped below the queue's lease window
    pub job_timeout: Duration,

    /// Attempts before a job is given up on (0 = retry forever)
    pub max_tries: u32,

    /// Delay before the first retry; doubles with each attempt
    pub base_backoff: Duration,

    /// Upper bound on the retry delay
    pub max_backoff: Duration,

    /// Queue to consume (the queue's default when `None`)
    pub queue: Option<String>,
}

impl WorkerConfig {
    /// Retry delay after the given attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Cap `job_timeout` so a handler never outlives its reservation.
    fn fit_lease(mut self, lease_window: Duration) -> Self {
        let limit = lease_window.saturating_sub(LEASE_MARGIN);
        if self.job_timeout > limit {
            warn!(
                job_timeout_secs = self.job_timeout.as_secs(),
                lease_secs = lease_window.as_secs(),
                "Job timeout exceeds the lease window, capping it"
            );
            self.job_timeout = limit;
        }
        self
    }

    /// Whether a job that has now been tried `attempts` times is done for.
    fn exhausted(&self, attempts: u32) -> bool {
        self.max_tries > 0 && attempts >= self.max_tries
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll_interval: Duration::from_secs(1),
            job_timeout: Duration::from_secs(50),
            max_tries: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(3600),
            queue: None,
        }
    }
}

/// What happened to a processed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Handler succeeded and the reservation was deleted
    Completed,
    /// Handler failed; the job will run again after `delay`
    Released { attempts: u32, delay: Duration },
    /// Handler failed for the last time and the job was dropped
    Failed { attempts: u32, error: String },
}

/// Worker for processing jobs from a queue.
pub struct Worker<Q> {
    queue: Q,
    handlers: Handlers,
    config: WorkerConfig,
    running: Arc<RwLock<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl<Q> Worker<Q>
where
    Q: JobQueue + Clone + 'static,
{
    /// Create a new worker.
    pub fn new(queue: Q) -> Self {
        Self::with_config(queue, WorkerConfig::default())
    }

    /// Create a worker with custom configuration.
    ///
    /// A `job_timeout` that would let a handler run past the queue's lease
    /// window is lowered to fit inside it.
    pub fn with_config(queue: Q, config: WorkerConfig) -> Self {
        let config = config.fit_lease(queue.lease_window());
        Self {
            queue,
            handlers: Arc::new(HashMap::new()),
            config,
            running: Arc::new(RwLock::new(false)),
            handles: Vec::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Register a job handler.
    ///
    /// Handlers registered after [`start`](Self::start) are picked up on the
    /// next start.
    ///
    /// # Examples
    ///
    /// ```
    /// use courier_queue::*;
    ///
    /// let queue = Queue::new(MemoryStore::new());
    /// let mut worker = Worker::new(queue);
    ///
    /// worker.register_handler("send_email", |job: Job| async move {
    ///     tracing::info!(to = %job.data()["to"], "Sending email");
    ///     Ok(())
    /// });
    /// ```
    pub fn register_handler<F, Fut>(&mut self, job_type: impl Into<String>, handler: F)
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueueResult<()>> + Send + 'static,
    {
        let wrapped_handler: JobHandler = Arc::new(
            move |job: Job| -> Pin<Box<dyn Future<Output = QueueResult<()>> + Send>> {
                Box::pin(handler(job))
            },
        );

        Arc::make_mut(&mut self.handlers).insert(job_type.into(), wrapped_handler);
    }

    /// Pop and run one job. Returns `None` when the queue was empty.
    pub async fn process_next(&self) -> QueueResult<Option<JobOutcome>> {
        process_one(&self.queue, &self.handlers, &self.config).await
    }

    /// Start the worker.
    pub async fn start(&mut self) -> QueueResult<()> {
        let mut running = self.running.write().await;
        if *running {
            return Err(QueueError::WorkerAlreadyRunning);
        }
        *running = true;
        drop(running);

        info!(
            concurrency = self.config.concurrency,
            queue = self.config.queue.as_deref().unwrap_or("<default>"),
            "Worker starting"
        );

        for i in 0..self.config.concurrency {
            let queue = self.queue.clone();
            let handlers = self.handlers.clone();
            let running = self.running.clone();
            let config = self.config.clone();

            let handle = tokio::spawn(async move {
                while *running.read().await {
                    match process_one(&queue, &handlers, &config).await {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            // No jobs available, wait before polling again
                            tokio::time::sleep(config.poll_interval).await;
                        }
                        Err(e) => {
                            error!(worker = i, error = %e, "Error fetching job");
                            tokio::time::sleep(config.poll_interval).await;
                        }
                    }
                }

                debug!(worker = i, "Worker task stopped");
            });

            self.handles.push(handle);
        }

        Ok(())
    }

    /// Stop the worker.
    pub async fn stop(&mut self) -> QueueResult<()> {
        let mut running = self.running.write().await;
        if !*running {
            return Err(QueueError::WorkerNotRunning);
        }
        *running = false;
        drop(running);

        info!("Worker stopping");

        // A job interrupted here stays reserved and returns after its lease
        for handle in self.handles.drain(..) {
            handle.abort();
        }

        info!("Worker stopped");
        Ok(())
    }

    /// Check if the worker is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

async fn process_one<Q: JobQueue + ?Sized>(
    queue: &Q,
    handlers: &HashMap<String, JobHandler>,
    config: &WorkerConfig,
) -> QueueResult<Option<JobOutcome>> {
    let Some(job) = queue.pop(config.queue.as_deref()).await? else {
        return Ok(None);
    };

    debug!(
        queue = %job.queue,
        job_id = %job.id(),
        job_type = job.job_type(),
        "Processing job"
    );

    let result = match handlers.get(job.job_type()) {
        Some(handler) => match tokio::time::timeout(config.job_timeout, handler(job.clone())).await
        {
            Ok(result) => result,
            Err(_) => Err(QueueError::Timeout),
        },
        None => Err(QueueError::NoHandler(job.job_type().to_string())),
    };

    let attempts = job.attempts().saturating_add(1);
    match result {
        Ok(()) => {
            queue.delete_reserved(&job.queue, &job.raw).await?;
            debug!(job_id = %job.id(), "Job completed");
            Ok(Some(JobOutcome::Completed))
        }
        Err(e) if config.exhausted(attempts) => {
            queue.delete_reserved(&job.queue, &job.raw).await?;
            error!(job_id = %job.id(), attempts, error = %e, "Job failed permanently");
            Ok(Some(JobOutcome::Failed {
                attempts,
                error: e.to_string(),
            }))
        }
        Err(e) => {
            let delay = config.backoff(attempts);
            queue.release(&job.queue, &job.raw, delay, attempts).await?;
            warn!(
                job_id = %job.id(),
                attempts,
                retry_in_secs = delay.as_secs(),
                error = %e,
                "Job failed, will retry"
            );
            Ok(Some(JobOutcome::Released { attempts, delay }))
        }
    }
}
