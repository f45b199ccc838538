//! Redis pub/sub implementation of the `RealtimePublisher` port.

use async_trait::async_trait;
use bb8_redis::redis::AsyncCommands;

use crate::domain::ids::UserId;
use crate::domain::ports::{RealtimePublishError, RealtimePublisher, UnreadCountUpdate};

use super::user_channel;
use crate::outbound::cache::RedisPool;

/// Publishes unread-count updates onto the per-user Redis channels.
#[derive(Clone)]
pub struct RedisRealtimePublisher {
    pool: RedisPool,
}

impl RedisRealtimePublisher {
    /// Create a publisher over the given pool.
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RealtimePublisher for RedisRealtimePublisher {
    async fn publish(
        &self,
        recipient: UserId,
        update: UnreadCountUpdate,
    ) -> Result<(), RealtimePublishError> {
        let payload = serde_json::to_string(&update)
            .map_err(|err| RealtimePublishError::encoding(err.to_string()))?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| RealtimePublishError::unavailable(err.to_string()))?;

        // The receiver count is irrelevant: no subscribers simply means
        // the recipient has no open session anywhere.
        let _: i64 = conn
            .publish(user_channel(recipient), payload)
            .await
            .map_err(|err| RealtimePublishError::unavailable(err.to_string()))?;
        Ok(())
    }
}
