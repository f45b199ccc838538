//! Port for notification persistence.

use async_trait::async_trait;

use crate::domain::ids::{ContentRef, NotificationId, UserId};
use crate::domain::notification::{Notification, NotificationKind};

use super::define_port_error;

define_port_error! {
    /// Errors raised by notification repository adapters.
    pub enum NotificationRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "notification repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "notification repository query failed: {message}",
    }
}

/// Fields of a notification to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: UserId,
    pub actor_id: UserId,
    pub kind: NotificationKind,
    pub related: Option<ContentRef>,
    pub message: String,
}

/// Port for notification rows.
///
/// Bulk mutations return the number of affected rows; single-row mutations
/// are scoped to `owner` so a recipient can only touch their own rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Persist a notification and return its identifier.
    async fn insert(
        &self,
        notification: &NewNotification,
    ) -> Result<NotificationId, NotificationRepositoryError>;

    /// Number of unread notifications owned by `user`.
    async fn unread_count(&self, user: UserId) -> Result<i64, NotificationRepositoryError>;

    /// Recent notifications owned by `user`, newest first.
    async fn list_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<Notification>, NotificationRepositoryError>;

    /// Mark one owned notification read. Returns `false` when nothing
    /// changed: the row is absent, owned by someone else, or already read.
    async fn mark_read(
        &self,
        id: NotificationId,
        owner: UserId,
    ) -> Result<bool, NotificationRepositoryError>;

    /// Mark every unread notification of `owner` read.
    async fn mark_all_read(&self, owner: UserId) -> Result<u64, NotificationRepositoryError>;

    /// Delete one owned notification. Returns `false` when no such row
    /// belongs to `owner`.
    async fn delete(
        &self,
        id: NotificationId,
        owner: UserId,
    ) -> Result<bool, NotificationRepositoryError>;

    /// Delete every notification of `owner`.
    async fn delete_all(&self, owner: UserId) -> Result<u64, NotificationRepositoryError>;
}
