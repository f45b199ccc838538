//! Periodic reconciliation task handlers.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::context::WorkerContext;

/// Copy the cached online set into `users.last_seen`.
pub(crate) async fn sync_presence_to_store(ctx: &WorkerContext) {
    let online = match ctx.presence.cached_online_ids().await {
        Ok(online) => online,
        Err(error) => {
            warn!(error = %error, "online-set read failed; presence sync skipped");
            return;
        }
    };
    if online.is_empty() {
        debug!("nobody online; presence sync skipped");
        return;
    }

    match ctx.users.touch_last_seen(&online, Utc::now()).await {
        Ok(()) => info!(users = online.len(), "last_seen synchronised"),
        Err(error) => warn!(error = %error, "last_seen update failed"),
    }
}

/// Recompute every user's counters from the authoritative tables.
pub(crate) async fn reconcile_user_counters(ctx: &WorkerContext, batch_size: usize) {
    match ctx.reconciler.run(batch_size).await {
        Ok(outcome) => {
            if outcome.updated > 0 {
                info!(
                    scanned = outcome.scanned,
                    updated = outcome.updated,
                    "counter drift corrected"
                );
            }
        }
        Err(error) => warn!(error = %error, "counter reconciliation failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::counters::CounterSnapshot;
    use crate::domain::ids::UserId;
    use crate::domain::outbox::TaskSubmitter;
    use crate::domain::ports::{
        FixtureDedupGuard, FixtureObjectStorage, FixturePresenceStore, FixtureRealtimePublisher,
        FixtureTaskQueue, MockContentRepository, MockNotificationRepository, MockUserRepository,
    };
    use crate::domain::presence::PresenceTracker;
    use crate::workers::context::WorkerContext;

    fn context(users: MockUserRepository, store: Arc<FixturePresenceStore>) -> WorkerContext {
        let mut content = MockContentRepository::new();
        content.expect_posts_by_author().returning(|| Ok(Vec::new()));
        content.expect_comments_by_author().returning(|| Ok(Vec::new()));
        content.expect_post_likes_by_author().returning(|| Ok(Vec::new()));
        content
            .expect_comment_likes_by_author()
            .returning(|| Ok(Vec::new()));
        WorkerContext::new(
            Arc::new(MockNotificationRepository::new()),
            Arc::new(content),
            Arc::new(users),
            PresenceTracker::new(store),
            Arc::new(FixtureObjectStorage::new()),
            Arc::new(FixtureRealtimePublisher::new()),
            TaskSubmitter::new(
                Arc::new(FixtureTaskQueue::new()),
                Arc::new(FixtureDedupGuard::new()),
            ),
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn presence_sync_touches_exactly_the_online_users() {
        let store = Arc::new(FixturePresenceStore::new());
        let online_user = UserId::random();
        let tracker = PresenceTracker::new(store.clone());
        tracker.mark_online(online_user).await.expect("mark succeeds");

        let mut users = MockUserRepository::new();
        users
            .expect_touch_last_seen()
            .withf(move |ids, _| ids == [online_user])
            .times(1)
            .returning(|_, _| Ok(()));
        let ctx = context(users, store);

        sync_presence_to_store(&ctx).await;
    }

    #[tokio::test]
    async fn presence_sync_with_nobody_online_writes_nothing() {
        let mut users = MockUserRepository::new();
        users.expect_touch_last_seen().never();
        let ctx = context(users, Arc::new(FixturePresenceStore::new()));

        sync_presence_to_store(&ctx).await;
    }

    #[tokio::test]
    async fn reconciliation_runs_through_the_reconciler() {
        let mut users = MockUserRepository::new();
        users
            .expect_counter_snapshots()
            .times(1)
            .returning(|| Ok(Vec::<CounterSnapshot>::new()));
        users.expect_write_counter_snapshots().never();
        let ctx = context(users, Arc::new(FixturePresenceStore::new()));

        reconcile_user_counters(&ctx, 1000).await;
    }
}
