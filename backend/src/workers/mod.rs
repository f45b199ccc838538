//! Task-queue worker handlers and periodic job entry points.
//!
//! One Apalis worker consumes every [`TaskMessage`] and dispatches on the
//! enum; two cron streams drive the periodic jobs. Handler failures follow
//! the layer's error policy: semantic dead ends (stale references, unknown
//! kinds, corrupt images) and infrastructure hiccups are logged and the
//! handler returns cleanly, leaving drift to the reconciliation jobs.
//! Nothing here ever reaches a user-facing request.

mod avatars;
mod context;
mod notify;
mod reconcile;

use apalis::prelude::{Data, Error};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::tasks::{TaskMessage, DEFAULT_RECONCILE_BATCH};

pub use context::WorkerContext;

/// Entry point for the queue worker.
pub async fn run_task(message: TaskMessage, ctx: Data<WorkerContext>) -> Result<(), Error> {
    dispatch(&message, &ctx).await;
    Ok(())
}

/// Execute one task message against the given context.
///
/// The queue entry point and the tests share this single dispatch path.
pub async fn dispatch(message: &TaskMessage, ctx: &WorkerContext) {
    debug!(task = message.name(), "task picked up");
    match message.clone() {
        TaskMessage::CreateNotification {
            recipient_id,
            actor_id,
            kind,
            related,
            message,
        } => {
            notify::create_notification(ctx, recipient_id, actor_id, kind, related, message).await;
        }
        TaskMessage::PushUnreadCount {
            recipient_id,
            update_list,
        } => notify::push_unread_count(ctx, recipient_id, update_list).await,
        TaskMessage::GenerateAvatarThumbnails { user_id, superseded } => {
            avatars::generate_avatar_thumbnails(ctx, user_id, superseded).await;
        }
        TaskMessage::DeleteStoragePaths { user_id, paths } => {
            avatars::delete_storage_paths(ctx, user_id, paths).await;
        }
        TaskMessage::DownloadAndSetAvatar { user_id, url } => {
            avatars::download_and_set_avatar(ctx, user_id, url).await;
        }
        TaskMessage::SyncPresenceToStore => reconcile::sync_presence_to_store(ctx).await,
        TaskMessage::ReconcileUserCounters { batch_size } => {
            reconcile::reconcile_user_counters(ctx, batch_size).await;
        }
    }
}

/// Cron tick driving the presence-to-store sync (every minute).
#[derive(Debug, Clone, Default)]
pub struct PresenceSyncTick(pub DateTime<Utc>);

impl From<DateTime<Utc>> for PresenceSyncTick {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

/// Entry point for the presence-sync cron stream.
pub async fn run_presence_sync(_tick: PresenceSyncTick, ctx: Data<WorkerContext>) -> Result<(), Error> {
    reconcile::sync_presence_to_store(&ctx).await;
    Ok(())
}

/// Cron tick driving counter reconciliation (hourly).
#[derive(Debug, Clone, Default)]
pub struct CounterReconcileTick(pub DateTime<Utc>);

impl From<DateTime<Utc>> for CounterReconcileTick {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

/// Entry point for the counter-reconciliation cron stream.
pub async fn run_counter_reconcile(
    _tick: CounterReconcileTick,
    ctx: Data<WorkerContext>,
) -> Result<(), Error> {
    reconcile::reconcile_user_counters(&ctx, DEFAULT_RECONCILE_BATCH).await;
    Ok(())
}
