//! Port for the user rows owned by the consistency layer.
//!
//! Covers the cached counter snapshot (fast-path clamp-add plus the
//! reconciliation read/write pair), the avatar path columns, and the
//! `last_seen` column fed by the periodic presence sync.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::avatars::AvatarPaths;
use crate::domain::counters::{CounterField, CounterSnapshot};
use crate::domain::ids::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by user repository adapters.
    pub enum UserRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "user repository query failed: {message}",
    }
}

/// Avatar-relevant projection of a user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAvatarRecord {
    pub id: UserId,
    pub username: String,
    pub avatar: AvatarPaths,
}

/// Port for user-row state owned by this layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Apply `delta` to one counter column as a single atomic
    /// `GREATEST(value + delta, 0)` update. Never goes below zero, never
    /// read-modify-write.
    async fn adjust_counter(
        &self,
        user: UserId,
        field: CounterField,
        delta: i32,
    ) -> Result<(), UserRepositoryError>;

    /// Every user's cached counter snapshot.
    async fn counter_snapshots(&self) -> Result<Vec<CounterSnapshot>, UserRepositoryError>;

    /// Overwrite the snapshots of the given users. Callers chunk this into
    /// bounded batches.
    async fn write_counter_snapshots(
        &self,
        snapshots: &[CounterSnapshot],
    ) -> Result<(), UserRepositoryError>;

    /// Avatar projection for one user; `None` when the row is gone.
    async fn find_avatar(
        &self,
        user: UserId,
    ) -> Result<Option<UserAvatarRecord>, UserRepositoryError>;

    /// Install a new original avatar path on the user row.
    async fn set_avatar_original(
        &self,
        user: UserId,
        path: &str,
    ) -> Result<(), UserRepositoryError>;

    /// Install freshly generated thumbnail paths on the user row.
    async fn set_avatar_thumbnails(
        &self,
        user: UserId,
        thumbnails: &[String; 3],
    ) -> Result<(), UserRepositoryError>;

    /// Bulk-update `last_seen` for the given users.
    async fn touch_last_seen(
        &self,
        users: &[UserId],
        at: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError>;
}
