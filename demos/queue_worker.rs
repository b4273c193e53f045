//! Job queue example.
//!
//! Runs a worker against Redis when `REDIS_URL` is set, otherwise against the
//! in-process store.
//!
//! ```text
//! REDIS_URL=redis://localhost:6379 RUST_LOG=courier_queue=debug cargo run --example queue_worker
//! ```

use courier::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), QueueError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("📦 Courier Job Queue Example\n");

    let config = QueueConfig::from_env()?;

    match std::env::var("REDIS_URL") {
        Ok(url) => {
            let queue = Queue::with_redis(RedisConfig::new(url), config).await?;
            println!("✅ Connected to Redis queue\n");
            run(queue).await
        }
        Err(_) => {
            println!("✅ Using in-process queue (set REDIS_URL to use Redis)\n");
            run(Queue::with_config(MemoryStore::new(), config)).await
        }
    }
}

async fn run<S>(queue: Queue<S>) -> Result<(), QueueError>
where
    S: Store + Clone + 'static,
{
    let email_count = Arc::new(AtomicU32::new(0));

    let config = WorkerConfig {
        concurrency: 3,
        poll_interval: Duration::from_millis(250),
        job_timeout: Duration::from_secs(30),
        max_tries: 3,
        base_backoff: Duration::from_secs(1),
        ..Default::default()
    };

    let mut worker = Worker::with_config(queue.clone(), config);

    println!("📝 Registering job handlers...\n");

    let email_counter = email_count.clone();
    worker.register_handler("send_email", move |job: Job| {
        let counter = email_counter.clone();
        async move {
            let to = job.data()["to"].as_str().unwrap_or("unknown");
            println!("📧 Sending email to {}", to);

            tokio::time::sleep(Duration::from_millis(200)).await;

            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    // Fails on its first run, succeeds on the retry
    worker.register_handler("flaky_task", |job: Job| async move {
        if job.attempts() == 0 {
            println!("❌ Flaky task failed (attempt {})", job.attempts() + 1);
            return Err(QueueError::ExecutionFailed("Simulated failure".to_string()));
        }

        println!("✅ Flaky task succeeded (attempt {})", job.attempts() + 1);
        Ok(())
    });

    println!("▶️  Starting worker...\n");
    worker.start().await?;

    println!("📤 Pushing jobs...\n");

    for i in 1..=3 {
        let job_id = queue
            .push(
                "send_email",
                serde_json::json!({ "to": format!("user{}@example.com", i) }),
                None,
            )
            .await?;
        println!("  ✓ Pushed email job: {}", job_id);
    }

    let job_id = queue
        .push_delayed(
            Duration::from_secs(2),
            "send_email",
            serde_json::json!({ "to": "delayed@example.com" }),
            None,
        )
        .await?;
    println!("  ✓ Pushed DELAYED job (2 seconds): {}", job_id);

    let job_id = queue
        .push("flaky_task", serde_json::json!({}), None)
        .await?;
    println!("  ✓ Pushed flaky job (will retry): {}", job_id);

    println!("\n⏱️  Processing jobs for 5 seconds...\n");
    tokio::time::sleep(Duration::from_secs(5)).await;

    worker.stop().await?;

    println!("\n📊 Summary:");
    println!("  Emails sent: {}", email_count.load(Ordering::SeqCst));
    println!("  Ready: {}", queue.size(None).await?);
    println!("  Delayed: {}", queue.delayed_count(None).await?);
    println!("  Reserved: {}", queue.reserved_count(None).await?);

    Ok(())
}
