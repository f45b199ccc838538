//! Messages carried by the distributed task queue.
//!
//! Delivery is at-least-once, so every handler in `crate::workers` is
//! idempotent. A message may carry a dedup key; the submitter collapses
//! equivalent pending messages behind a short keyed lease (see
//! [`crate::domain::outbox::TaskSubmitter`]).

use serde::{Deserialize, Serialize};

use crate::domain::ids::{ContentRef, UserId};
use crate::domain::notification::NotificationKind;

/// Default batch size for counter reconciliation writes.
pub const DEFAULT_RECONCILE_BATCH: usize = 1000;

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskMessage {
    /// Persist one notification, no-op when the related object is gone.
    CreateNotification {
        recipient_id: UserId,
        actor_id: UserId,
        kind: NotificationKind,
        related: Option<ContentRef>,
        message: String,
    },
    /// Recount the recipient's unread notifications and broadcast the
    /// result to every connected session. Deduplicated per recipient.
    PushUnreadCount {
        recipient_id: UserId,
        update_list: bool,
    },
    /// Regenerate the recipient's avatar thumbnails, then chain deletion of
    /// the superseded generation.
    GenerateAvatarThumbnails {
        user_id: UserId,
        superseded: Vec<String>,
    },
    /// Delete specific storage paths, or sweep the user's whole prefix for
    /// orphans when `paths` is `None`.
    DeleteStoragePaths {
        user_id: UserId,
        paths: Option<Vec<String>>,
    },
    /// Fetch a social-login avatar over HTTP and install it.
    DownloadAndSetAvatar { user_id: UserId, url: String },
    /// Copy the online set into `users.last_seen`. Periodic, no arguments.
    SyncPresenceToStore,
    /// Recompute every user's counter snapshot from authoritative data.
    ReconcileUserCounters { batch_size: usize },
}

impl TaskMessage {
    /// Stable task name for logging and dedup keys.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateNotification { .. } => "create_notification",
            Self::PushUnreadCount { .. } => "push_unread_count",
            Self::GenerateAvatarThumbnails { .. } => "generate_avatar_thumbnails",
            Self::DeleteStoragePaths { .. } => "delete_storage_paths",
            Self::DownloadAndSetAvatar { .. } => "download_and_set_avatar",
            Self::SyncPresenceToStore => "sync_presence_to_store",
            Self::ReconcileUserCounters { .. } => "reconcile_user_counters",
        }
    }

    /// Key under which equivalent pending messages collapse, if any.
    ///
    /// Only unread-count pushes deduplicate: ten likes landing in the same
    /// second must not produce ten pushes to one recipient.
    pub fn dedup_key(&self) -> Option<String> {
        match self {
            Self::PushUnreadCount { recipient_id, .. } => {
                Some(format!("{}:{recipient_id}", self.name()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn only_pushes_carry_a_dedup_key() {
        let recipient_id = UserId::random();
        let push = TaskMessage::PushUnreadCount {
            recipient_id,
            update_list: true,
        };
        assert_eq!(
            push.dedup_key(),
            Some(format!("push_unread_count:{recipient_id}"))
        );

        let sweep = TaskMessage::DeleteStoragePaths {
            user_id: recipient_id,
            paths: None,
        };
        assert_eq!(sweep.dedup_key(), None);
    }

    #[rstest]
    fn dedup_key_is_per_recipient() {
        let a = TaskMessage::PushUnreadCount {
            recipient_id: UserId::random(),
            update_list: true,
        };
        let b = TaskMessage::PushUnreadCount {
            recipient_id: UserId::random(),
            update_list: true,
        };
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[rstest]
    fn update_list_does_not_change_the_dedup_key() {
        let recipient_id = UserId::random();
        let count_only = TaskMessage::PushUnreadCount {
            recipient_id,
            update_list: false,
        };
        let with_list = TaskMessage::PushUnreadCount {
            recipient_id,
            update_list: true,
        };
        assert_eq!(count_only.dedup_key(), with_list.dedup_key());
    }

    #[rstest]
    fn messages_survive_queue_serialisation() {
        let message = TaskMessage::CreateNotification {
            recipient_id: UserId::random(),
            actor_id: UserId::random(),
            kind: NotificationKind::PostLike,
            related: None,
            message: "User sam liked your post \"hello\".".to_owned(),
        };
        let json = serde_json::to_string(&message).expect("task serialises");
        assert!(json.contains("\"task\":\"create_notification\""));
        let back: TaskMessage = serde_json::from_str(&json).expect("task deserialises");
        assert_eq!(back, message);
    }
}
