//! Cached per-user activity counters and their reconciliation.
//!
//! The counters on the user row are cached aggregates. The fast path nudges
//! them with atomic clamp-at-zero deltas on every create/delete; this module
//! owns the slow path, a full recompute from the authoritative tables that
//! is correct regardless of how the cache drifted (missed events, failed
//! tasks, direct data edits). Two consecutive runs over unchanged data
//! produce no writes on the second run.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::ids::UserId;
use crate::domain::ports::{
    ContentRepository, ContentRepositoryError, OwnerCount, UserRepository, UserRepositoryError,
};

/// Counter columns cached on the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    PostsCount,
    CommentsCount,
    Reputation,
}

impl CounterField {
    /// Column name in the relational store.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PostsCount => "posts_count",
            Self::CommentsCount => "comments_count",
            Self::Reputation => "reputation",
        }
    }
}

/// One user's cached counters. Values are clamped at zero in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub user_id: UserId,
    pub posts_count: i32,
    pub comments_count: i32,
    pub reputation: i32,
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    /// Users whose snapshot was compared.
    pub scanned: usize,
    /// Users whose snapshot was rewritten.
    pub updated: usize,
    /// Write batches issued.
    pub batches: usize,
}

/// Errors surfaced by a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// Reading the authoritative tables failed.
    #[error(transparent)]
    Content(#[from] ContentRepositoryError),
    /// Reading or writing user snapshots failed.
    #[error(transparent)]
    Users(#[from] UserRepositoryError),
}

/// Full-recompute reconciliation of user counter snapshots.
#[derive(Clone)]
pub struct CounterReconciler {
    content: Arc<dyn ContentRepository>,
    users: Arc<dyn UserRepository>,
}

impl CounterReconciler {
    /// Build a reconciler over the given ports.
    pub fn new(content: Arc<dyn ContentRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { content, users }
    }

    /// Recompute every user's counters and write back only drifted rows,
    /// in batches of at most `batch_size`.
    pub async fn run(&self, batch_size: usize) -> Result<ReconcileOutcome, ReconcileError> {
        let batch_size = batch_size.max(1);

        let posts = to_map(self.content.posts_by_author().await?);
        let comments = to_map(self.content.comments_by_author().await?);
        let reputation = merge_reputation(
            self.content.post_likes_by_author().await?,
            self.content.comment_likes_by_author().await?,
        );

        let snapshots = self.users.counter_snapshots().await?;
        let mut outcome = ReconcileOutcome {
            scanned: snapshots.len(),
            ..ReconcileOutcome::default()
        };

        let drifted: Vec<CounterSnapshot> = snapshots
            .into_iter()
            .filter_map(|current| {
                let target = CounterSnapshot {
                    user_id: current.user_id,
                    posts_count: clamp_count(posts.get(&current.user_id)),
                    comments_count: clamp_count(comments.get(&current.user_id)),
                    reputation: clamp_count(reputation.get(&current.user_id)),
                };
                (target != current).then_some(target)
            })
            .collect();

        for chunk in drifted.chunks(batch_size) {
            self.users.write_counter_snapshots(chunk).await?;
            outcome.batches += 1;
            outcome.updated += chunk.len();
        }

        info!(
            scanned = outcome.scanned,
            updated = outcome.updated,
            batches = outcome.batches,
            "counter reconciliation finished"
        );
        Ok(outcome)
    }
}

fn to_map(rows: Vec<OwnerCount>) -> HashMap<UserId, i64> {
    rows.into_iter().collect()
}

/// Reputation is the sum of likes across a user's posts and comments.
fn merge_reputation(posts: Vec<OwnerCount>, comments: Vec<OwnerCount>) -> HashMap<UserId, i64> {
    let mut merged = to_map(posts);
    for (owner, count) in comments {
        *merged.entry(owner).or_insert(0) += count;
    }
    merged
}

fn clamp_count(value: Option<&i64>) -> i32 {
    let value = value.copied().unwrap_or(0).max(0);
    i32::try_from(value).unwrap_or(i32::MAX)
}
