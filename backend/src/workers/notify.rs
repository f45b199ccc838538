//! Notification fan-out task handlers.

use tracing::{debug, info, warn};

use crate::domain::ids::{ContentRef, UserId};
use crate::domain::notification::NotificationKind;
use crate::domain::ports::{NewNotification, UnreadCountUpdate};
use crate::domain::tasks::TaskMessage;

use super::context::WorkerContext;

/// Persist one notification, then schedule an unread-count push.
///
/// No-ops without error when the related object was deleted between event
/// emission and task execution. That check is correctness, not an
/// optimisation: it is what keeps orphaned notifications from pointing at
/// nothing from the moment they are born.
pub(crate) async fn create_notification(
    ctx: &WorkerContext,
    recipient_id: UserId,
    actor_id: UserId,
    kind: NotificationKind,
    related: Option<ContentRef>,
    message: String,
) {
    if let Some(reference) = related {
        match ctx.content.exists(&reference).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    %recipient_id,
                    reference = %reference,
                    kind = kind.as_str(),
                    "related object gone; skipping notification"
                );
                return;
            }
            Err(error) => {
                warn!(
                    %recipient_id,
                    reference = %reference,
                    error = %error,
                    "existence check failed; skipping notification"
                );
                return;
            }
        }
    }

    let new_notification = NewNotification {
        recipient_id,
        actor_id,
        kind,
        related,
        message,
    };
    match ctx.notifications.insert(&new_notification).await {
        Ok(id) => {
            info!(
                %recipient_id,
                %actor_id,
                notification = %id,
                kind = kind.as_str(),
                "notification created"
            );
            ctx.submitter
                .submit(&TaskMessage::PushUnreadCount {
                    recipient_id,
                    update_list: true,
                })
                .await;
        }
        Err(error) => {
            warn!(%recipient_id, error = %error, "notification insert failed");
        }
    }
}

/// Recount unread notifications and broadcast to every open session.
///
/// The count is computed at execution time, not enqueue time, so a stale
/// push that outlived its trigger is harmless. Always releases the dedup
/// lease, even on failure, so the next trigger can queue a fresh push.
pub(crate) async fn push_unread_count(ctx: &WorkerContext, recipient_id: UserId, update_list: bool) {
    let message = TaskMessage::PushUnreadCount {
        recipient_id,
        update_list,
    };

    match ctx.notifications.unread_count(recipient_id).await {
        Ok(unread_notifications_count) => {
            let update = UnreadCountUpdate {
                unread_notifications_count,
                update_list,
            };
            if let Err(error) = ctx.realtime.publish(recipient_id, update).await {
                warn!(%recipient_id, error = %error, "unread-count publish failed");
            }
        }
        Err(error) => {
            warn!(%recipient_id, error = %error, "unread recount failed; push dropped");
        }
    }

    ctx.submitter.finish(&message).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::counters::CounterSnapshot;
    use crate::domain::ids::{LikeId, NotificationId};
    use crate::domain::outbox::TaskSubmitter;
    use crate::domain::ports::{
        ContentRepositoryError, FixtureDedupGuard, FixtureObjectStorage, FixturePresenceStore,
        FixtureRealtimePublisher, FixtureTaskQueue, MockContentRepository,
        MockNotificationRepository, MockUserRepository, NotificationRepositoryError,
    };
    use crate::domain::presence::PresenceTracker;
    use crate::domain::tasks::TaskMessage;

    fn context(
        notifications: MockNotificationRepository,
        content: MockContentRepository,
    ) -> (WorkerContext, Arc<FixtureTaskQueue>, Arc<FixtureRealtimePublisher>) {
        let queue = Arc::new(FixtureTaskQueue::new());
        let realtime = Arc::new(FixtureRealtimePublisher::new());
        let mut users = MockUserRepository::new();
        users
            .expect_counter_snapshots()
            .returning(|| Ok(Vec::<CounterSnapshot>::new()));
        let ctx = WorkerContext::new(
            Arc::new(notifications),
            Arc::new(content),
            Arc::new(users),
            PresenceTracker::new(Arc::new(FixturePresenceStore::new())),
            Arc::new(FixtureObjectStorage::new()),
            realtime.clone(),
            TaskSubmitter::new(queue.clone(), Arc::new(FixtureDedupGuard::new())),
            reqwest::Client::new(),
        );
        (ctx, queue, realtime)
    }

    #[tokio::test]
    async fn deleted_target_creates_nothing_and_raises_nothing() {
        let mut notifications = MockNotificationRepository::new();
        notifications.expect_insert().never();
        let mut content = MockContentRepository::new();
        content.expect_exists().returning(|_| Ok(false));
        let (ctx, queue, _) = context(notifications, content);

        create_notification(
            &ctx,
            UserId::random(),
            UserId::random(),
            NotificationKind::PostLike,
            Some(ContentRef::like(LikeId::random())),
            "User sam liked your post \"hi\".".to_owned(),
        )
        .await;

        assert!(queue.submitted().is_empty());
    }

    #[tokio::test]
    async fn live_target_creates_and_schedules_a_push() {
        let recipient = UserId::random();
        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_insert()
            .returning(|_| Ok(NotificationId::random()));
        let mut content = MockContentRepository::new();
        content.expect_exists().returning(|_| Ok(true));
        let (ctx, queue, _) = context(notifications, content);

        create_notification(
            &ctx,
            recipient,
            UserId::random(),
            NotificationKind::CommentOnPost,
            Some(ContentRef::like(LikeId::random())),
            "User sam commented.".to_owned(),
        )
        .await;

        assert_eq!(
            queue.submitted(),
            vec![TaskMessage::PushUnreadCount {
                recipient_id: recipient,
                update_list: true,
            }]
        );
    }

    #[tokio::test]
    async fn failing_existence_check_skips_without_side_effects() {
        let mut notifications = MockNotificationRepository::new();
        notifications.expect_insert().never();
        let mut content = MockContentRepository::new();
        content
            .expect_exists()
            .returning(|_| Err(ContentRepositoryError::connection("db down")));
        let (ctx, queue, _) = context(notifications, content);

        create_notification(
            &ctx,
            UserId::random(),
            UserId::random(),
            NotificationKind::PostLike,
            Some(ContentRef::like(LikeId::random())),
            "message".to_owned(),
        )
        .await;

        assert!(queue.submitted().is_empty());
    }

    #[tokio::test]
    async fn push_recounts_at_execution_time_and_broadcasts() {
        let recipient = UserId::random();
        let mut notifications = MockNotificationRepository::new();
        notifications.expect_unread_count().returning(|_| Ok(7));
        let (ctx, _, realtime) = context(notifications, MockContentRepository::new());

        push_unread_count(&ctx, recipient, true).await;

        let published = realtime.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, recipient);
        assert_eq!(published[0].1.unread_notifications_count, 7);
        assert!(published[0].1.update_list);
    }

    #[tokio::test]
    async fn push_releases_the_lease_even_when_the_recount_fails() {
        let recipient = UserId::random();
        let mut notifications = MockNotificationRepository::new();
        notifications
            .expect_unread_count()
            .returning(|_| Err(NotificationRepositoryError::connection("db down")));
        let (ctx, queue, realtime) = context(notifications, MockContentRepository::new());

        // Occupy the lease the way a submission would have.
        let message = TaskMessage::PushUnreadCount {
            recipient_id: recipient,
            update_list: true,
        };
        assert!(ctx.submitter.submit(&message).await);
        queue.clear();

        push_unread_count(&ctx, recipient, true).await;

        assert!(realtime.published().is_empty());
        // The lease is free again: a new submission goes through.
        assert!(ctx.submitter.submit(&message).await);
    }
}
