//! Redis-backed `PresenceStore` implementation.
//!
//! Key layout:
//! - `online_user:<uuid>` — TTL marker, the source of truth for liveness.
//! - `online_users_set` — parallel set enabling O(1) enumeration.
//! - `online_users:cached` — JSON array caching the last enumeration.
//!
//! `mark_online` and `remove_online` mutate marker and set in one
//! `MULTI`/`EXEC` pipeline so the pair can never half-apply.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::redis::{self, AsyncCommands};
use tracing::warn;
use uuid::Uuid;

use crate::domain::ids::UserId;
use crate::domain::ports::{PresenceStore, PresenceStoreError};

use super::RedisPool;

const MARKER_PREFIX: &str = "online_user";
const ONLINE_SET_KEY: &str = "online_users_set";
const CACHED_IDS_KEY: &str = "online_users:cached";

/// Redis adapter for the presence store port.
#[derive(Clone)]
pub struct RedisPresenceStore {
    pool: RedisPool,
}

impl RedisPresenceStore {
    /// Create an adapter over the given pool.
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<bb8_redis::bb8::PooledConnection<'_, bb8_redis::RedisConnectionManager>, PresenceStoreError>
    {
        self.pool
            .get()
            .await
            .map_err(|err| PresenceStoreError::unavailable(err.to_string()))
    }
}

fn marker_key(user: UserId) -> String {
    format!("{MARKER_PREFIX}:{user}")
}

fn map_redis_error(error: redis::RedisError) -> PresenceStoreError {
    PresenceStoreError::unavailable(error.to_string())
}

fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn parse_members(raw: Vec<String>) -> Vec<UserId> {
    raw.into_iter()
        .filter_map(|member| match Uuid::parse_str(&member) {
            Ok(id) => Some(UserId::from_uuid(id)),
            Err(_) => {
                warn!(member, "dropping malformed online-set member");
                None
            }
        })
        .collect()
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn mark_online(&self, user: UserId, ttl: Duration) -> Result<(), PresenceStoreError> {
        let mut conn = self.conn().await?;

        let _: () = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(marker_key(user))
            .arg("1")
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .ignore()
            .cmd("SADD")
            .arg(ONLINE_SET_KEY)
            .arg(user.to_string())
            .ignore()
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn is_online(&self, user: UserId) -> Result<bool, PresenceStoreError> {
        let mut conn = self.conn().await?;
        conn.exists(marker_key(user)).await.map_err(map_redis_error)
    }

    async fn remove_online(&self, user: UserId) -> Result<(), PresenceStoreError> {
        let mut conn = self.conn().await?;

        let _: () = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(marker_key(user))
            .ignore()
            .cmd("SREM")
            .arg(ONLINE_SET_KEY)
            .arg(user.to_string())
            .ignore()
            .query_async(&mut *conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn set_members(&self) -> Result<Vec<UserId>, PresenceStoreError> {
        let mut conn = self.conn().await?;
        let raw: Vec<String> = conn.smembers(ONLINE_SET_KEY).await.map_err(map_redis_error)?;
        Ok(parse_members(raw))
    }

    async fn check_live(&self, users: &[UserId]) -> Result<Vec<bool>, PresenceStoreError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;

        // One pipelined round-trip regardless of how many users are online.
        let mut pipe = redis::pipe();
        for user in users {
            pipe.cmd("EXISTS").arg(marker_key(*user));
        }
        let flags: Vec<bool> = pipe.query_async(&mut *conn).await.map_err(map_redis_error)?;
        Ok(flags)
    }

    async fn evict(&self, users: &[UserId]) -> Result<(), PresenceStoreError> {
        if users.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;

        let members: Vec<String> = users.iter().map(ToString::to_string).collect();
        let _: i64 = conn
            .srem(ONLINE_SET_KEY, members)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn read_cached_ids(&self) -> Result<Option<Vec<UserId>>, PresenceStoreError> {
        let mut conn = self.conn().await?;

        let raw: Option<String> = conn.get(CACHED_IDS_KEY).await.map_err(map_redis_error)?;
        match raw {
            None => Ok(None),
            Some(json) => {
                let ids: Vec<Uuid> = serde_json::from_str(&json)
                    .map_err(|err| PresenceStoreError::corrupt(err.to_string()))?;
                Ok(Some(ids.into_iter().map(UserId::from_uuid).collect()))
            }
        }
    }

    async fn write_cached_ids(
        &self,
        users: &[UserId],
        ttl: Duration,
    ) -> Result<(), PresenceStoreError> {
        let mut conn = self.conn().await?;

        let ids: Vec<&Uuid> = users.iter().map(UserId::as_uuid).collect();
        let json = serde_json::to_string(&ids)
            .map_err(|err| PresenceStoreError::corrupt(err.to_string()))?;
        let _: () = conn
            .set_ex(CACHED_IDS_KEY, json, ttl_seconds(ttl))
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}
