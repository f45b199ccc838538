//! Redis-backed `DedupGuard` implementation.
//!
//! The lease is a plain `SET key 1 NX EX <ttl>`: first submitter wins,
//! everyone else sees the key and collapses. The TTL bounds how long a
//! crashed or hung task can shadow later submissions.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::redis::{self, AsyncCommands};

use crate::domain::ports::{DedupGuard, DedupGuardError};

use super::RedisPool;

const LEASE_PREFIX: &str = "task_lease";

/// Redis adapter for the dedup guard port.
#[derive(Clone)]
pub struct RedisDedupGuard {
    pool: RedisPool,
}

impl RedisDedupGuard {
    /// Create an adapter over the given pool.
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

fn lease_key(key: &str) -> String {
    format!("{LEASE_PREFIX}:{key}")
}

fn map_redis_error(error: redis::RedisError) -> DedupGuardError {
    DedupGuardError::unavailable(error.to_string())
}

#[async_trait]
impl DedupGuard for RedisDedupGuard {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, DedupGuardError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| DedupGuardError::unavailable(err.to_string()))?;

        // SET ... NX returns OK when the lease was taken, Nil otherwise.
        let reply: Option<String> = redis::cmd("SET")
            .arg(lease_key(key))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> Result<(), DedupGuardError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| DedupGuardError::unavailable(err.to_string()))?;

        let _: i64 = conn.del(lease_key(key)).await.map_err(map_redis_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn lease_keys_are_namespaced() {
        assert_eq!(
            lease_key("push_unread_count:abc"),
            "task_lease:push_unread_count:abc"
        );
    }
}
