//! PostgreSQL-backed `NotificationRepository` implementation using Diesel.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;
use uuid::Uuid;

use crate::domain::ids::{ContentKind, ContentRef, NotificationId, UserId};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::{
    NewNotification, NotificationRepository, NotificationRepositoryError,
};

use super::map_errors::adapter_error_mappers;
use super::models::{NewNotificationRow, NotificationRow};
use super::pool::DbPool;
use super::schema::notifications;

adapter_error_mappers!(NotificationRepositoryError);

/// Diesel-backed implementation of the `NotificationRepository` port.
#[derive(Clone)]
pub struct DieselNotificationRepository {
    pool: DbPool,
}

impl DieselNotificationRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Convert a database row to a domain notification.
///
/// Rows with an unknown kind string (schema drift, manual edits) yield
/// `None` and are skipped by list reads.
fn row_to_notification(row: NotificationRow) -> Option<Notification> {
    let Some(kind) = NotificationKind::parse(&row.kind) else {
        warn!(id = %row.id, kind = row.kind, "skipping notification with unknown kind");
        return None;
    };

    let related = match (&row.related_kind, row.related_id) {
        (Some(raw_kind), Some(id)) => match ContentKind::parse(raw_kind) {
            Some(content_kind) => Some(ContentRef::new(content_kind, id)),
            None => {
                warn!(id = %row.id, related_kind = raw_kind, "dropping unknown related kind");
                None
            }
        },
        _ => None,
    };

    Some(Notification {
        id: NotificationId::from_uuid(row.id),
        recipient_id: UserId::from_uuid(row.recipient_id),
        actor_id: UserId::from_uuid(row.actor_id),
        kind,
        related,
        message: row.message,
        is_read: row.is_read,
        created_at: row.created_at,
    })
}

#[async_trait]
impl NotificationRepository for DieselNotificationRepository {
    async fn insert(
        &self,
        notification: &NewNotification,
    ) -> Result<NotificationId, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let id = Uuid::new_v4();
        let row = NewNotificationRow {
            id,
            recipient_id: *notification.recipient_id.as_uuid(),
            actor_id: *notification.actor_id.as_uuid(),
            kind: notification.kind.as_str(),
            related_kind: notification.related.as_ref().map(|r| r.kind.as_str()),
            related_id: notification.related.as_ref().map(|r| r.id),
            message: &notification.message,
        };

        diesel::insert_into(notifications::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(NotificationId::from_uuid(id))
    }

    async fn unread_count(&self, user: UserId) -> Result<i64, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        notifications::table
            .filter(notifications::recipient_id.eq(user.as_uuid()))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn list_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<Notification>, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<NotificationRow> = notifications::table
            .filter(notifications::recipient_id.eq(user.as_uuid()))
            .order(notifications::created_at.desc())
            .select(NotificationRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows.into_iter().filter_map(row_to_notification).collect())
    }

    async fn mark_read(
        &self,
        id: NotificationId,
        owner: UserId,
    ) -> Result<bool, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let updated = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id.as_uuid()))
                .filter(notifications::recipient_id.eq(owner.as_uuid()))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        Ok(updated > 0)
    }

    async fn mark_all_read(&self, owner: UserId) -> Result<u64, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let updated = diesel::update(
            notifications::table
                .filter(notifications::recipient_id.eq(owner.as_uuid()))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        Ok(updated as u64)
    }

    async fn delete(
        &self,
        id: NotificationId,
        owner: UserId,
    ) -> Result<bool, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted = diesel::delete(
            notifications::table
                .filter(notifications::id.eq(id.as_uuid()))
                .filter(notifications::recipient_id.eq(owner.as_uuid())),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        Ok(deleted > 0)
    }

    async fn delete_all(&self, owner: UserId) -> Result<u64, NotificationRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let deleted = diesel::delete(
            notifications::table.filter(notifications::recipient_id.eq(owner.as_uuid())),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn row(kind: &str, related_kind: Option<&str>) -> NotificationRow {
        NotificationRow {
            id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
            kind: kind.to_owned(),
            related_kind: related_kind.map(str::to_owned),
            related_id: related_kind.map(|_| Uuid::new_v4()),
            message: "User sam liked your post \"hi\".".to_owned(),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    fn known_rows_convert_with_their_reference() {
        let converted = row_to_notification(row("post_like", Some("like")))
            .expect("known kind converts");
        assert_eq!(converted.kind, NotificationKind::PostLike);
        assert_eq!(
            converted.related.map(|r| r.kind),
            Some(ContentKind::Like)
        );
    }

    #[rstest]
    fn unknown_kind_rows_are_skipped() {
        assert!(row_to_notification(row("mention", None)).is_none());
    }

    #[rstest]
    fn unknown_related_kind_degrades_to_no_reference() {
        let converted = row_to_notification(row("post_like", Some("attachment")))
            .expect("notification still converts");
        assert!(converted.related.is_none());
    }
}
