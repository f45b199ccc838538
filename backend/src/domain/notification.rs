//! Notification entity and the fixed event-to-message derivation table.
//!
//! Messages embed post titles and comment excerpts truncated to
//! [`EXCERPT_CHARS`] characters. Actions a user performs on their own
//! content ("you liked your own post") never name a third-party actor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{ContentRef, NotificationId, UserId};

/// Maximum characters of a title or comment excerpt embedded in a message.
pub const EXCERPT_CHARS: usize = 15;

/// Maximum stored message length.
pub const MESSAGE_MAX: usize = 255;

/// Classification of a notification by the event that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PostLike,
    CommentLike,
    PostCreated,
    CommentOnPost,
    ReplyToComment,
    UserRegistered,
}

impl NotificationKind {
    /// Stable string form used in storage and wire payloads.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PostLike => "post_like",
            Self::CommentLike => "comment_like",
            Self::PostCreated => "post_created",
            Self::CommentOnPost => "comment_on_post",
            Self::ReplyToComment => "reply_to_comment",
            Self::UserRegistered => "user_registered",
        }
    }

    /// Parse the stable string form; `None` for unknown kinds.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "post_like" => Some(Self::PostLike),
            "comment_like" => Some(Self::CommentLike),
            "post_created" => Some(Self::PostCreated),
            "comment_on_post" => Some(Self::CommentOnPost),
            "reply_to_comment" => Some(Self::ReplyToComment),
            "user_registered" => Some(Self::UserRegistered),
            _ => None,
        }
    }
}

/// Persisted notification owned by its recipient.
///
/// ## Invariants
/// - `related` may point at an object that has since been deleted; renders
///   must tolerate a missing target.
/// - `message` never exceeds [`MESSAGE_MAX`] characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub actor_id: UserId,
    pub kind: NotificationKind,
    pub related: Option<ContentRef>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Truncate `text` to [`EXCERPT_CHARS`] characters, appending an ellipsis
/// when anything was cut.
pub fn excerpt(text: &str) -> String {
    let mut taken: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        taken.push('…');
    }
    taken
}

/// Message for a like landing on a post.
pub fn post_like_message(liker_username: &str, is_own: bool, title: &str) -> String {
    let title = excerpt(title);
    if is_own {
        format!("You liked your own post \"{title}\".")
    } else {
        format!("User {liker_username} liked your post \"{title}\".")
    }
}

/// Message for a like landing on a comment.
pub fn comment_like_message(liker_username: &str, is_own: bool, comment: &str) -> String {
    let comment = excerpt(comment);
    if is_own {
        format!("You liked your own comment \"{comment}\".")
    } else {
        format!("User {liker_username} liked your comment \"{comment}\".")
    }
}

/// Message confirming the author's own new post.
pub fn post_created_message(title: &str) -> String {
    let title = excerpt(title);
    format!("You published a new post \"{title}\".")
}

/// Message for a comment on a post, addressed to the post author.
pub fn comment_on_post_message(
    commenter_username: &str,
    is_own: bool,
    comment: &str,
    title: &str,
) -> String {
    let comment = excerpt(comment);
    let title = excerpt(title);
    if is_own {
        format!("You commented \"{comment}\" on your post \"{title}\".")
    } else {
        format!("User {commenter_username} commented \"{comment}\" on your post \"{title}\".")
    }
}

/// Message for a reply, addressed to the parent comment's author.
pub fn reply_to_comment_message(
    replier_username: &str,
    is_own: bool,
    reply: &str,
    parent: &str,
) -> String {
    let reply = excerpt(reply);
    let parent = excerpt(parent);
    if is_own {
        format!("You replied \"{reply}\" to your own comment \"{parent}\".")
    } else {
        format!("User {replier_username} replied \"{reply}\" to your comment \"{parent}\".")
    }
}

/// Welcome message for a freshly registered account.
pub fn user_registered_message() -> String {
    "Welcome! Your registration was successful.".to_owned()
}
