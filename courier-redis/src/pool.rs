//! Redis connection pool.

use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use tracing::{debug, info};

use crate::{RedisConfig, RedisError, Result};

/// Type alias for the connection pool.
pub type RedisPool = Pool<RedisConnectionManager>;

/// A pooled connection owned by its holder until dropped.
///
/// Each pool slot is a separate server connection, so commands that carry
/// per-connection state (WATCH, MULTI) are safe while the lease is held.
pub type RedisConnection = PooledConnection<'static, RedisConnectionManager>;

/// Builder for creating Redis connection pools.
pub struct RedisPoolBuilder {
    config: RedisConfig,
}

impl RedisPoolBuilder {
    /// Create a new pool builder.
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }

    /// Build the connection pool and verify it with a PING.
    pub async fn build(self) -> Result<RedisPool> {
        self.config.validate()?;
        let url = self.config.connection_url()?;

        let manager = RedisConnectionManager::new(url)
            .map_err(|e| RedisError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(self.config.pool_size)
            .min_idle(self.config.min_idle)
            .connection_timeout(self.config.connection_timeout)
            .build(manager)
            .await
            .map_err(|e| RedisError::Pool(e.to_string()))?;

        ping(&pool).await?;

        info!(
            pool_size = self.config.pool_size,
            url = %self.config.url,
            "Redis connection pool created"
        );

        Ok(pool)
    }
}

/// Lease a connection from the pool for exclusive use.
pub async fn lease(pool: &RedisPool) -> Result<RedisConnection> {
    let conn = pool.get_owned().await?;
    Ok(conn)
}

/// Check that the server answers on a pooled connection.
pub async fn ping(pool: &RedisPool) -> Result<()> {
    let mut conn = lease(pool).await?;
    let pong: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| RedisError::Connection(e.to_string()))?;
    debug!(reply = %pong, "Redis ping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let config = RedisConfig::builder().pool_size(0).build();
        let result = RedisPoolBuilder::new(config).build().await;
        assert!(matches!(result, Err(RedisError::Config(_))));
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_build_and_ping() {
        let config = RedisConfig::from_env().pool_size(2).build();
        let pool = RedisPoolBuilder::new(config).build().await.unwrap();
        ping(&pool).await.unwrap();

        let _conn = lease(&pool).await.unwrap();
        assert!(pool.state().connections >= 1);
    }
}
