//! # Courier Redis
//!
//! Redis connection pooling and configuration shared by the Courier crates.
//!
//! ## Features
//!
//! - **Connection Pooling**: bb8 pool of multiplexed connections
//! - **Exclusive Leases**: owned connections for WATCH/MULTI/EXEC sequences
//! - **Environment Configuration**: `RedisConfig::from_env()`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_redis::{RedisConfig, RedisPoolBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::builder()
//!         .url("redis://localhost:6379")
//!         .pool_size(10)
//!         .build();
//!
//!     let pool = RedisPoolBuilder::new(config).build().await?;
//!
//!     // Lease a connection; it returns to the pool on drop
//!     let mut conn = courier_redis::lease(&pool).await?;
//!     redis::cmd("SET")
//!         .arg("key")
//!         .arg("value")
//!         .query_async::<()>(&mut *conn)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod pool;

pub use config::{RedisConfig, RedisConfigBuilder};
pub use error::{RedisError, Result};
pub use pool::{RedisConnection, RedisPool, RedisPoolBuilder, lease, ping};

// Re-export redis crate for convenience
pub use redis;
pub use redis::{AsyncCommands, RedisResult};

/// Prelude for common imports.
///
/// ```
/// use courier_redis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{RedisConfig, RedisConfigBuilder};
    pub use crate::error::{RedisError, Result};
    pub use crate::pool::{RedisConnection, RedisPool, RedisPoolBuilder};
    pub use redis::AsyncCommands;
}
