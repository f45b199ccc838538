//! Read-side port over the authoritative posts/comments/likes tables.
//!
//! The consistency layer never writes these tables; the excluded CRUD
//! layer owns them. This port exposes the two things the layer needs:
//! existence checks for stale-reference detection, and grouped aggregates
//! for counter reconciliation.

use async_trait::async_trait;

use crate::domain::ids::{ContentRef, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by content repository adapters.
    pub enum ContentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "content repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "content repository query failed: {message}",
    }
}

/// Per-owner aggregate row, e.g. `(author, number of posts)`.
pub type OwnerCount = (UserId, i64);

/// Port for authoritative content reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Whether the referenced object still exists.
    async fn exists(&self, reference: &ContentRef) -> Result<bool, ContentRepositoryError>;

    /// Number of posts per author, absent authors omitted.
    async fn posts_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError>;

    /// Number of comments per author, absent authors omitted.
    async fn comments_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError>;

    /// Likes received across each author's posts.
    async fn post_likes_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError>;

    /// Likes received across each author's comments.
    async fn comment_likes_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError>;
}
