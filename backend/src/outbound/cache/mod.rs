//! Redis adapters: presence store and dedup guard.
//!
//! Connections are pooled through `bb8-redis`. Every multi-key mutation
//! that must not half-apply goes through an atomic `MULTI`/`EXEC` pipeline.

mod redis_dedup_guard;
mod redis_presence_store;

use bb8_redis::{bb8, RedisConnectionManager};

pub use redis_dedup_guard::RedisDedupGuard;
pub use redis_presence_store::RedisPresenceStore;

/// Pooled Redis connections shared by the adapters.
pub type RedisPool = bb8::Pool<RedisConnectionManager>;

/// Build a Redis connection pool for the given URL.
///
/// # Errors
///
/// Returns the underlying driver error when the URL is malformed or the
/// pool cannot be initialised.
pub async fn connect_redis(url: &str) -> Result<RedisPool, bb8_redis::redis::RedisError> {
    let manager = RedisConnectionManager::new(url)?;
    bb8::Pool::builder().build(manager).await
}
