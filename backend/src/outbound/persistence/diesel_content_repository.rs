//! PostgreSQL-backed `ContentRepository` implementation using Diesel.
//!
//! Read-only adapter over the authoritative posts/comments/likes tables.
//! The reconciliation aggregates are grouped in SQL so the whole recompute
//! is a handful of round-trips regardless of table size.

use async_trait::async_trait;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ids::{ContentKind, ContentRef, UserId};
use crate::domain::ports::{ContentRepository, ContentRepositoryError, OwnerCount};

use super::map_errors::adapter_error_mappers;
use super::pool::DbPool;
use super::schema::{comments, likes, posts, users};

adapter_error_mappers!(ContentRepositoryError);

/// Diesel-backed implementation of the `ContentRepository` port.
#[derive(Clone)]
pub struct DieselContentRepository {
    pool: DbPool,
}

impl DieselContentRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_owner_counts(rows: Vec<(Uuid, i64)>) -> Vec<OwnerCount> {
    rows.into_iter()
        .map(|(owner, count)| (UserId::from_uuid(owner), count))
        .collect()
}

#[async_trait]
impl ContentRepository for DieselContentRepository {
    async fn exists(&self, reference: &ContentRef) -> Result<bool, ContentRepositoryError> {
        use diesel::dsl::exists;

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let found = match reference.kind {
            ContentKind::Post => {
                diesel::select(exists(posts::table.filter(posts::id.eq(reference.id))))
                    .get_result(&mut conn)
                    .await
            }
            ContentKind::Comment => {
                diesel::select(exists(comments::table.filter(comments::id.eq(reference.id))))
                    .get_result(&mut conn)
                    .await
            }
            ContentKind::Like => {
                diesel::select(exists(likes::table.filter(likes::id.eq(reference.id))))
                    .get_result(&mut conn)
                    .await
            }
            ContentKind::User => {
                diesel::select(exists(users::table.filter(users::id.eq(reference.id))))
                    .get_result(&mut conn)
                    .await
            }
        };

        found.map_err(map_diesel_error)
    }

    async fn posts_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<(Uuid, i64)> = posts::table
            .group_by(posts::author_id)
            .select((posts::author_id, count_star()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(to_owner_counts(rows))
    }

    async fn comments_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<(Uuid, i64)> = comments::table
            .group_by(comments::author_id)
            .select((comments::author_id, count_star()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(to_owner_counts(rows))
    }

    async fn post_likes_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<(Uuid, i64)> = likes::table
            .inner_join(
                posts::table.on(likes::object_id
                    .eq(posts::id)
                    .and(likes::content_kind.eq(ContentKind::Post.as_str()))),
            )
            .group_by(posts::author_id)
            .select((posts::author_id, count_star()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(to_owner_counts(rows))
    }

    async fn comment_likes_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<(Uuid, i64)> = likes::table
            .inner_join(
                comments::table.on(likes::object_id
                    .eq(comments::id)
                    .and(likes::content_kind.eq(ContentKind::Comment.as_str()))),
            )
            .group_by(comments::author_id)
            .select((comments::author_id, count_star()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(to_owner_counts(rows))
    }
}
