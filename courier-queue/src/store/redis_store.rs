//! Redis store backend.

use super::{Batch, Command, ScoreBound, Store, StoreConnection};
use crate::error::QueueResult;
use async_trait::async_trait;
use courier_redis::{RedisConfig, RedisConnection, RedisPool, RedisPoolBuilder};
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::info;

/// Store backed by a pool of Redis connections.
#[derive(Clone)]
pub struct RedisStore {
    pool: RedisPool,
}

impl RedisStore {
    /// Build a pool from `config` and verify the server answers.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use courier_queue::RedisStore;
    /// use courier_redis::RedisConfig;
    ///
    /// # async fn example() -> courier_queue::QueueResult<()> {
    /// let store = RedisStore::new(RedisConfig::new("redis://localhost:6379")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: RedisConfig) -> QueueResult<Self> {
        let pool = RedisPoolBuilder::new(config).build().await?;
        info!("Redis queue store ready");
        Ok(Self { pool })
    }

    /// Connect with default pool settings.
    pub async fn connect(redis_url: impl Into<String>) -> QueueResult<Self> {
        Self::new(RedisConfig::new(redis_url)).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }
}

#[async_trait]
impl Store for RedisStore {
    type Connection = RedisStoreConnection;

    async fn connection(&self) -> QueueResult<Self::Connection> {
        let conn = courier_redis::lease(&self.pool).await?;
        Ok(RedisStoreConnection { conn })
    }
}

/// A pooled Redis connection leased to one queue operation.
pub struct RedisStoreConnection {
    conn: RedisConnection,
}

impl RedisStoreConnection {
    fn redis(&mut self) -> &mut MultiplexedConnection {
        &mut self.conn
    }
}

#[async_trait]
impl StoreConnection for RedisStoreConnection {
    async fn push_right(&mut self, list: &str, values: &[String]) -> QueueResult<()> {
        let _: () = self.redis().rpush(list, values).await?;
        Ok(())
    }

    async fn pop_left(&mut self, list: &str) -> QueueResult<Option<String>> {
        let value: Option<String> = self.redis().lpop(list, None).await?;
        Ok(value)
    }

    async fn scored_add(&mut self, set: &str, score: i64, member: &str) -> QueueResult<()> {
        let _: () = self.redis().zadd(set, member, score).await?;
        Ok(())
    }

    async fn scored_range_by_score(
        &mut self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> QueueResult<Vec<String>> {
        let members: Vec<String> = self
            .redis()
            .zrangebyscore(set, min.to_string(), max.to_string())
            .await?;
        Ok(members)
    }

    async fn scored_remove(&mut self, set: &str, member: &str) -> QueueResult<bool> {
        let removed: u64 = self.redis().zrem(set, member).await?;
        Ok(removed > 0)
    }

    async fn scored_remove_range_by_score(
        &mut self,
        set: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> QueueResult<u64> {
        let removed: u64 = self
            .redis()
            .zrembyscore(set, min.to_string(), max.to_string())
            .await?;
        Ok(removed)
    }

    async fn list_len(&mut self, list: &str) -> QueueResult<u64> {
        let len: u64 = self.redis().llen(list).await?;
        Ok(len)
    }

    async fn scored_count(&mut self, set: &str) -> QueueResult<u64> {
        let count: u64 = self.redis().zcard(set).await?;
        Ok(count)
    }

    async fn delete(&mut self, keys: &[&str]) -> QueueResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let _: () = self.redis().del(keys).await?;
        Ok(())
    }

    async fn watch(&mut self, keys: &[&str]) -> QueueResult<()> {
        redis::cmd("WATCH")
            .arg(keys)
            .query_async::<()>(self.redis())
            .await?;
        Ok(())
    }

    async fn unwatch(&mut self) -> QueueResult<()> {
        redis::cmd("UNWATCH").query_async::<()>(self.redis()).await?;
        Ok(())
    }

    async fn commit(&mut self, batch: &Batch) -> QueueResult<bool> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for command in batch.commands() {
            match command {
                Command::PushRight { list, values } => {
                    pipe.rpush(list, values.as_slice()).ignore();
                }
                Command::ScoredAdd { set, score, member } => {
                    pipe.zadd(set, member, *score).ignore();
                }
                Command::ScoredRemove { set, member } => {
                    pipe.zrem(set, member).ignore();
                }
                Command::ScoredRemoveRangeByScore { set, min, max } => {
                    pipe.zrembyscore(set, min.to_string(), max.to_string())
                        .ignore();
                }
            }
        }

        // EXEC replies nil when a watched key changed
        let reply: Option<()> = pipe.query_async(self.redis()).await?;
        Ok(reply.is_some())
    }
}
