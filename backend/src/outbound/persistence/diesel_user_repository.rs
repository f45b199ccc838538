//! PostgreSQL-backed `UserRepository` implementation using Diesel.
//!
//! The fast-path counter update is a single `GREATEST(col + delta, 0)`
//! statement so concurrent workers can nudge the same row without a
//! read-modify-write race and without ever driving a counter negative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::domain::avatars::AvatarPaths;
use crate::domain::counters::{CounterField, CounterSnapshot};
use crate::domain::ids::UserId;
use crate::domain::ports::{UserAvatarRecord, UserRepository, UserRepositoryError};

use super::map_errors::adapter_error_mappers;
use super::models::{UserAvatarRow, UserCounterRow};
use super::pool::DbPool;
use super::schema::users;

adapter_error_mappers!(UserRepositoryError);

/// Diesel-backed implementation of the `UserRepository` port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_snapshot(row: UserCounterRow) -> CounterSnapshot {
    CounterSnapshot {
        user_id: UserId::from_uuid(row.id),
        posts_count: row.posts_count,
        comments_count: row.comments_count,
        reputation: row.reputation,
    }
}

fn row_to_avatar_record(row: UserAvatarRow) -> UserAvatarRecord {
    UserAvatarRecord {
        id: UserId::from_uuid(row.id),
        username: row.username,
        avatar: AvatarPaths {
            original: row.avatar,
            thumbnails: [
                row.avatar_small_size1,
                row.avatar_small_size2,
                row.avatar_small_size3,
            ],
        },
    }
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn adjust_counter(
        &self,
        user: UserId,
        field: CounterField,
        delta: i32,
    ) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let target = users::table.filter(users::id.eq(user.as_uuid()));

        // One clamped statement per column; never read-modify-write.
        let result = match field {
            CounterField::PostsCount => {
                diesel::update(target)
                    .set(users::posts_count.eq(sql::<Integer>("GREATEST(posts_count + ")
                        .bind::<Integer, _>(delta)
                        .sql(", 0)")))
                    .execute(&mut conn)
                    .await
            }
            CounterField::CommentsCount => {
                diesel::update(target)
                    .set(users::comments_count.eq(sql::<Integer>("GREATEST(comments_count + ")
                        .bind::<Integer, _>(delta)
                        .sql(", 0)")))
                    .execute(&mut conn)
                    .await
            }
            CounterField::Reputation => {
                diesel::update(target)
                    .set(users::reputation.eq(sql::<Integer>("GREATEST(reputation + ")
                        .bind::<Integer, _>(delta)
                        .sql(", 0)")))
                    .execute(&mut conn)
                    .await
            }
        };

        result.map(|_| ()).map_err(map_diesel_error)
    }

    async fn counter_snapshots(&self) -> Result<Vec<CounterSnapshot>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<UserCounterRow> = users::table
            .select(UserCounterRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows.into_iter().map(row_to_snapshot).collect())
    }

    async fn write_counter_snapshots(
        &self,
        snapshots: &[CounterSnapshot],
    ) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                for snapshot in snapshots {
                    diesel::update(users::table.filter(users::id.eq(snapshot.user_id.as_uuid())))
                        .set((
                            users::posts_count.eq(snapshot.posts_count),
                            users::comments_count.eq(snapshot.comments_count),
                            users::reputation.eq(snapshot.reputation),
                        ))
                        .execute(conn)
                        .await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }

    async fn find_avatar(
        &self,
        user: UserId,
    ) -> Result<Option<UserAvatarRecord>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<UserAvatarRow> = users::table
            .filter(users::id.eq(user.as_uuid()))
            .select(UserAvatarRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(row_to_avatar_record))
    }

    async fn set_avatar_original(
        &self,
        user: UserId,
        path: &str,
    ) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(users::table.filter(users::id.eq(user.as_uuid())))
            .set(users::avatar.eq(path))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn set_avatar_thumbnails(
        &self,
        user: UserId,
        thumbnails: &[String; 3],
    ) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::update(users::table.filter(users::id.eq(user.as_uuid())))
            .set((
                users::avatar_small_size1.eq(&thumbnails[0]),
                users::avatar_small_size2.eq(&thumbnails[1]),
                users::avatar_small_size3.eq(&thumbnails[2]),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn touch_last_seen(
        &self,
        users_to_touch: &[UserId],
        at: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        if users_to_touch.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let ids: Vec<_> = users_to_touch.iter().map(UserId::as_uuid).collect();
        diesel::update(users::table.filter(users::id.eq_any(ids)))
            .set(users::last_seen.eq(Some(at)))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}
