//! Store backends.
//!
//! The queue engine needs a key-value store with atomic list commands, atomic
//! sorted-set commands and optimistic transactions (WATCH + atomic commit).
//! [`Store`] hands out exclusively held connections; everything runs on a
//! [`StoreConnection`] so a WATCH and its commit always share a connection.

use crate::error::QueueResult;
use async_trait::async_trait;
use std::fmt;

pub mod memory;
pub mod redis_store;

pub use memory::{MemoryConnection, MemoryStore};
pub use redis_store::{RedisStore, RedisStoreConnection};

/// One end of a score range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    /// Below every score
    NegInfinity,
    /// Inclusive bound at the given score
    Inclusive(i64),
    /// Above every score
    PosInfinity,
}

impl ScoreBound {
    /// Whether `score` lies on the permitted side when used as a lower bound.
    pub fn admits_from_below(self, score: i64) -> bool {
        match self {
            Self::NegInfinity => true,
            Self::Inclusive(bound) => score >= bound,
            Self::PosInfinity => false,
        }
    }

    /// Whether `score` lies on the permitted side when used as an upper bound.
    pub fn admits_from_above(self, score: i64) -> bool {
        match self {
            Self::NegInfinity => false,
            Self::Inclusive(bound) => score <= bound,
            Self::PosInfinity => true,
        }
    }
}

/// Renders in the syntax Redis range commands accept.
impl fmt::Display for ScoreBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegInfinity => f.write_str("-inf"),
            Self::Inclusive(score) => write!(f, "{}", score),
            Self::PosInfinity => f.write_str("+inf"),
        }
    }
}

/// A write command queued in a [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Append values to the tail of a list
    PushRight { list: String, values: Vec<String> },
    /// Add or rescore a sorted-set member
    ScoredAdd {
        set: String,
        score: i64,
        member: String,
    },
    /// Remove a sorted-set member
    ScoredRemove { set: String, member: String },
    /// Remove sorted-set members whose score lies in `[min, max]`
    ScoredRemoveRangeByScore {
        set: String,
        min: ScoreBound,
        max: ScoreBound,
    },
}

/// Write commands committed together, all or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an RPUSH.
    pub fn push_right(&mut self, list: &str, values: Vec<String>) -> &mut Self {
        self.commands.push(Command::PushRight {
            list: list.to_string(),
            values,
        });
        self
    }

    /// Queue a ZADD.
    pub fn scored_add(&mut self, set: &str, score: i64, member: &str) -> &mut Self {
        self.commands.push(Command::ScoredAdd {
            set: set.to_string(),
            score,
            member: member.to_string(),
        });
        self
    }

    /// Queue a ZREM.
    pub fn scored_remove(&mut self, set: &str, member: &str) -> &mut Self {
        self.commands.push(Command::ScoredRemove {
            set: set.to_string(),
            member: member.to_string(),
        });
        self
    }

    /// Queue a ZREMRANGEBYSCORE.
    pub fn scored_remove_range_by_score(
        &mut self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> &mut Self {
        self.commands.push(Command::ScoredRemoveRangeByScore {
            set: set.to_string(),
            min,
            max,
        });
        self
    }

    /// Queued commands in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Source of store connections.
#[async_trait]
pub trait Store: Send + Sync {
    /// Connection type handed out by this store.
    type Connection: StoreConnection;

    /// Acquire a connection for exclusive use until dropped.
    async fn connection(&self) -> QueueResult<Self::Connection>;
}

/// Commands the queue engine issues against one connection.
///
/// Single commands are atomic on their own. [`watch`](Self::watch) plus
/// [`commit`](Self::commit) give optimistic multi-key transactions.
#[async_trait]
pub trait StoreConnection: Send {
    /// Append values to the tail of a list.
    async fn push_right(&mut self, list: &str, values: &[String]) -> QueueResult<()>;

    /// Remove and return the head of a list.
    async fn pop_left(&mut self, list: &str) -> QueueResult<Option<String>>;

    /// Add `member` with `score`, rescoring it if already present.
    async fn scored_add(&mut self, set: &str, score: i64, member: &str) -> QueueResult<()>;

    /// Members with score in `[min, max]`, ascending by score then member.
    async fn scored_range_by_score(
        &mut self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> QueueResult<Vec<String>>;

    /// Remove `member`; returns whether it was present.
    async fn scored_remove(&mut self, set: &str, member: &str) -> QueueResult<bool>;

    /// Remove members with score in `[min, max]`; returns how many.
    async fn scored_remove_range_by_score(
        &mut self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> QueueResult<u64>;

    /// Length of a list (0 when absent).
    async fn list_len(&mut self, list: &str) -> QueueResult<u64>;

    /// Cardinality of a sorted set (0 when absent).
    async fn scored_count(&mut self, set: &str) -> QueueResult<u64>;

    /// Delete keys outright.
    async fn delete(&mut self, keys: &[&str]) -> QueueResult<()>;

    /// Start watching keys for modification by anyone.
    async fn watch(&mut self, keys: &[&str]) -> QueueResult<()>;

    /// Forget all watched keys.
    async fn unwatch(&mut self) -> QueueResult<()>;

    /// Apply `batch` atomically and clear watches.
    ///
    /// Returns `false`, applying nothing, when a watched key was modified
    /// since [`watch`](Self::watch).
    async fn commit(&mut self, batch: &Batch) -> QueueResult<bool>;
}
