//! Recipient-facing notification maintenance.
//!
//! Read-state changes and deletions alter the unread count, so every
//! successful mutation schedules a deduplicated unread-count push for the
//! owner. Bulk operations return immediately after the row mutation; the
//! push happens off the request path like every other fan-out.

use std::sync::Arc;

use crate::domain::ids::{NotificationId, UserId};
use crate::domain::notification::Notification;
use crate::domain::outbox::TaskSubmitter;
use crate::domain::ports::{NotificationRepository, NotificationRepositoryError};
use crate::domain::tasks::TaskMessage;

/// Maintenance operations a recipient performs on their own notifications.
#[derive(Clone)]
pub struct NotificationService {
    repository: Arc<dyn NotificationRepository>,
    submitter: TaskSubmitter,
}

impl NotificationService {
    /// Build the service over the repository and task submitter.
    pub fn new(repository: Arc<dyn NotificationRepository>, submitter: TaskSubmitter) -> Self {
        Self {
            repository,
            submitter,
        }
    }

    async fn push_count(&self, owner: UserId, update_list: bool) {
        self.submitter
            .submit(&TaskMessage::PushUnreadCount {
                recipient_id: owner,
                update_list,
            })
            .await;
    }

    /// Recent notifications owned by `owner`, newest first.
    pub async fn list(
        &self,
        owner: UserId,
    ) -> Result<Vec<Notification>, NotificationRepositoryError> {
        self.repository.list_for_user(owner).await
    }

    /// Current unread count for `owner`.
    pub async fn unread_count(&self, owner: UserId) -> Result<i64, NotificationRepositoryError> {
        self.repository.unread_count(owner).await
    }

    /// Mark one owned notification read. Returns `false` when the row does
    /// not belong to `owner`.
    pub async fn mark_read(
        &self,
        id: NotificationId,
        owner: UserId,
    ) -> Result<bool, NotificationRepositoryError> {
        let changed = self.repository.mark_read(id, owner).await?;
        if changed {
            self.push_count(owner, true).await;
        }
        Ok(changed)
    }

    /// Mark everything read. The follow-up push carries
    /// `update_list: false`: the list on screen is already correct, only
    /// the badge needs refreshing.
    pub async fn mark_all_read(&self, owner: UserId) -> Result<u64, NotificationRepositoryError> {
        let changed = self.repository.mark_all_read(owner).await?;
        self.push_count(owner, false).await;
        Ok(changed)
    }

    /// Delete one owned notification.
    pub async fn delete(
        &self,
        id: NotificationId,
        owner: UserId,
    ) -> Result<bool, NotificationRepositoryError> {
        let deleted = self.repository.delete(id, owner).await?;
        if deleted {
            self.push_count(owner, true).await;
        }
        Ok(deleted)
    }

    /// Delete every notification of `owner`.
    pub async fn delete_all(&self, owner: UserId) -> Result<u64, NotificationRepositoryError> {
        let deleted = self.repository.delete_all(owner).await?;
        if deleted > 0 {
            self.push_count(owner, true).await;
        }
        Ok(deleted)
    }
}
