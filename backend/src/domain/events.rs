//! Explicit domain-event publication.
//!
//! The CRUD layer calls one `on_*` handler per mutation, inside the same
//! unit of work, passing a snapshot of the mutated rows and the unit's
//! [`Outbox`]. Handlers derive notification tasks from the fixed table in
//! [`crate::domain::notification`] and apply the fast-path counter deltas.
//! There is no hidden registration: everything that reacts to a mutation
//! is reachable from these functions.
//!
//! The counter nudges are a best-effort optimisation, not the source of
//! truth; a failed nudge is logged and left for reconciliation rather than
//! failing the caller's request.

use std::sync::Arc;

use tracing::warn;

use crate::domain::avatars::AvatarPaths;
use crate::domain::counters::CounterField;
use crate::domain::ids::{CommentId, ContentRef, LikeId, PostId, UserId};
use crate::domain::notification::{
    comment_like_message, comment_on_post_message, post_created_message, post_like_message,
    reply_to_comment_message, user_registered_message, NotificationKind,
};
use crate::domain::outbox::Outbox;
use crate::domain::ports::UserRepository;
use crate::domain::tasks::TaskMessage;

/// Post fields the derivation table needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSnapshot {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,
}

/// Parent-comment fields needed when deriving reply notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub id: CommentId,
    pub author_id: UserId,
    pub excerpt: String,
}

/// Comment fields the derivation table needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentSnapshot {
    pub id: CommentId,
    pub author_id: UserId,
    pub author_username: String,
    pub excerpt: String,
    pub post: PostSnapshot,
    pub reply_to: Option<ReplyTarget>,
}

/// The object a like landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeTarget {
    Post {
        id: PostId,
        author_id: UserId,
        title: String,
    },
    Comment {
        id: CommentId,
        author_id: UserId,
        excerpt: String,
    },
}

impl LikeTarget {
    /// Author of the liked object, the like's notification recipient.
    pub const fn author_id(&self) -> UserId {
        match self {
            Self::Post { author_id, .. } | Self::Comment { author_id, .. } => *author_id,
        }
    }
}

/// Like fields the derivation table needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeSnapshot {
    pub id: LikeId,
    pub liker_id: UserId,
    pub liker_username: String,
    pub target: LikeTarget,
}

/// User fields needed for registration and deletion events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSnapshot {
    pub id: UserId,
    pub username: String,
    pub avatar: AvatarPaths,
}

/// Explicit publication point for content mutations.
#[derive(Clone)]
pub struct ContentEvents {
    users: Arc<dyn UserRepository>,
}

impl ContentEvents {
    /// Build the publication service over the user repository.
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    async fn nudge_counter(&self, user: UserId, field: CounterField, delta: i32) {
        if let Err(error) = self.users.adjust_counter(user, field, delta).await {
            warn!(
                %user,
                field = field.as_str(),
                delta,
                error = %error,
                "fast-path counter nudge failed; reconciliation will heal"
            );
        }
    }

    /// A post was inserted in the current unit of work.
    pub async fn on_post_created(&self, outbox: &mut Outbox, post: &PostSnapshot) {
        self.nudge_counter(post.author_id, CounterField::PostsCount, 1)
            .await;
        outbox.register(TaskMessage::CreateNotification {
            recipient_id: post.author_id,
            actor_id: post.author_id,
            kind: NotificationKind::PostCreated,
            related: Some(ContentRef::post(post.id)),
            message: post_created_message(&post.title),
        });
    }

    /// A post was deleted in the current unit of work.
    pub async fn on_post_deleted(&self, _outbox: &mut Outbox, post: &PostSnapshot) {
        self.nudge_counter(post.author_id, CounterField::PostsCount, -1)
            .await;
    }

    /// A comment was inserted in the current unit of work.
    pub async fn on_comment_created(&self, outbox: &mut Outbox, comment: &CommentSnapshot) {
        self.nudge_counter(comment.author_id, CounterField::CommentsCount, 1)
            .await;

        match &comment.reply_to {
            Some(parent) => {
                // The post author hears about the comment too, unless they
                // wrote it or they are the one being replied to.
                if comment.author_id != comment.post.author_id
                    && comment.post.author_id != parent.author_id
                {
                    outbox.register(self.comment_on_post(comment));
                }
                outbox.register(TaskMessage::CreateNotification {
                    recipient_id: parent.author_id,
                    actor_id: comment.author_id,
                    kind: NotificationKind::ReplyToComment,
                    related: Some(ContentRef::comment(comment.id)),
                    message: reply_to_comment_message(
                        &comment.author_username,
                        comment.author_id == parent.author_id,
                        &comment.excerpt,
                        &parent.excerpt,
                    ),
                });
            }
            None => outbox.register(self.comment_on_post(comment)),
        }
    }

    fn comment_on_post(&self, comment: &CommentSnapshot) -> TaskMessage {
        TaskMessage::CreateNotification {
            recipient_id: comment.post.author_id,
            actor_id: comment.author_id,
            kind: NotificationKind::CommentOnPost,
            related: Some(ContentRef::comment(comment.id)),
            message: comment_on_post_message(
                &comment.author_username,
                comment.author_id == comment.post.author_id,
                &comment.excerpt,
                &comment.post.title,
            ),
        }
    }

    /// A comment was deleted in the current unit of work.
    pub async fn on_comment_deleted(&self, _outbox: &mut Outbox, comment: &CommentSnapshot) {
        self.nudge_counter(comment.author_id, CounterField::CommentsCount, -1)
            .await;
    }

    /// A like was inserted in the current unit of work.
    pub async fn on_like_created(&self, outbox: &mut Outbox, like: &LikeSnapshot) {
        let recipient = like.target.author_id();
        self.nudge_counter(recipient, CounterField::Reputation, 1)
            .await;

        let is_own = recipient == like.liker_id;
        let (kind, message) = match &like.target {
            LikeTarget::Post { title, .. } => (
                NotificationKind::PostLike,
                post_like_message(&like.liker_username, is_own, title),
            ),
            LikeTarget::Comment { excerpt, .. } => (
                NotificationKind::CommentLike,
                comment_like_message(&like.liker_username, is_own, excerpt),
            ),
        };
        outbox.register(TaskMessage::CreateNotification {
            recipient_id: recipient,
            actor_id: like.liker_id,
            kind,
            related: Some(ContentRef::like(like.id)),
            message,
        });
    }

    /// A like was removed in the current unit of work. No notification; the
    /// author just loses the reputation point.
    pub async fn on_like_deleted(&self, _outbox: &mut Outbox, like: &LikeSnapshot) {
        self.nudge_counter(like.target.author_id(), CounterField::Reputation, -1)
            .await;
    }

    /// A user account was created in the current unit of work.
    pub async fn on_user_registered(&self, outbox: &mut Outbox, user: &UserSnapshot) {
        outbox.register(TaskMessage::CreateNotification {
            recipient_id: user.id,
            actor_id: user.id,
            kind: NotificationKind::UserRegistered,
            related: Some(ContentRef::user(user.id)),
            message: user_registered_message(),
        });
        if !user.avatar.is_default() {
            outbox.register(TaskMessage::GenerateAvatarThumbnails {
                user_id: user.id,
                superseded: Vec::new(),
            });
        }
    }

    /// The user's original avatar column was overwritten with a new upload.
    ///
    /// `superseded` is the previous generation's deletable paths, computed
    /// before the row was overwritten. Deletion is chained after thumbnail
    /// generation so a concurrently regenerating file is never deleted out
    /// from under its writer.
    pub fn on_avatar_uploaded(&self, outbox: &mut Outbox, user: UserId, superseded: Vec<String>) {
        outbox.register(TaskMessage::GenerateAvatarThumbnails {
            user_id: user,
            superseded,
        });
    }

    /// The user's avatar was reset to the system default.
    pub fn on_avatar_removed(&self, outbox: &mut Outbox, user: UserId, superseded: Vec<String>) {
        if !superseded.is_empty() {
            outbox.register(TaskMessage::DeleteStoragePaths {
                user_id: user,
                paths: Some(superseded),
            });
        }
    }

    /// The user row was deleted; their whole avatar generation goes with it.
    pub fn on_user_deleted(&self, outbox: &mut Outbox, user: &UserSnapshot) {
        let paths = user.avatar.deletable();
        if !paths.is_empty() {
            outbox.register(TaskMessage::DeleteStoragePaths {
                user_id: user.id,
                paths: Some(paths),
            });
        }
    }
}
