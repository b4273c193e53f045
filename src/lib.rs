// Courier - a reliable background job queue for Rust
//
// This library bundles the queue engine and the Redis connection layer it
// runs on.

// Re-export the queue engine
pub use courier_queue::*;

// Re-export the Redis layer under its own name
pub use courier_redis;
pub use courier_redis::{RedisConfig, RedisConfigBuilder, RedisError, RedisPool};
