//! Moving due jobs from a scored set onto a ready list.
//!
//! The sweep reads the due members under WATCH, then commits the removal and
//! the push as one atomic batch. The read and the removal share the same
//! `[-inf, now]` range, so a job that becomes due between the two steps is
//! neither removed nor pushed; it waits for the next sweep. A concurrent
//! writer to the source set aborts the commit and the sweep starts over.

use crate::error::{QueueError, QueueResult};
use crate::store::{Batch, ScoreBound, StoreConnection};
use tracing::{debug, warn};

/// Attempts made before a contended sweep gives up.
pub const DEFAULT_RETRY_LIMIT: u32 = 10;

/// Move every member of `from` with score `<= now` to the tail of `to`.
///
/// Members are appended in ascending score order. Returns the number moved;
/// zero means nothing was written. Fails with
/// [`QueueError::TransactionConflict`] when `from` changed under every one of
/// `retry_limit` attempts; the source set is left as it was.
pub async fn migrate_expired<C>(
    conn: &mut C,
    from: &str,
    to: &str,
    now: i64,
    retry_limit: u32,
) -> QueueResult<usize>
where
    C: StoreConnection + ?Sized,
{
    let attempts = retry_limit.max(1);
    let max = ScoreBound::Inclusive(now);

    for attempt in 1..=attempts {
        conn.watch(&[from]).await?;

        let due = match conn
            .scored_range_by_score(from, ScoreBound::NegInfinity, max)
            .await
        {
            Ok(due) => due,
            Err(err) => {
                // Best effort; the read error is what the caller needs to see
                let _ = conn.unwatch().await;
                return Err(err);
            }
        };

        if due.is_empty() {
            conn.unwatch().await?;
            return Ok(0);
        }

        let moved = due.len();
        let mut batch = Batch::new();
        batch
            .scored_remove_range_by_score(from, ScoreBound::NegInfinity, max)
            .push_right(to, due);

        if conn.commit(&batch).await? {
            debug!(from, to, moved, attempt, "Migrated expired jobs");
            return Ok(moved);
        }

        debug!(from, attempt, "Source set changed during migration, retrying");
    }

    warn!(from, attempts, "Migration gave up after repeated conflicts");
    Err(QueueError::TransactionConflict {
        key: from.to_string(),
        attempts,
    })
}
