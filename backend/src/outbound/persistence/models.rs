//! Diesel row structs mapping between the schema and domain types.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{notifications, users};

/// Counter projection of a user row.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserCounterRow {
    pub id: Uuid,
    pub posts_count: i32,
    pub comments_count: i32,
    pub reputation: i32,
}

/// Avatar projection of a user row.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserAvatarRow {
    pub id: Uuid,
    pub username: String,
    pub avatar: String,
    pub avatar_small_size1: String,
    pub avatar_small_size2: String,
    pub avatar_small_size3: String,
}

/// Full notification row.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationRow {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: String,
    pub related_kind: Option<String>,
    pub related_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Insertable notification row.
#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotificationRow<'a> {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub kind: &'a str,
    pub related_kind: Option<&'a str>,
    pub related_id: Option<Uuid>,
    pub message: &'a str,
}
