//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations under `migrations/` exactly;
//! Diesel uses them for compile-time query validation. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// User accounts with their cached activity counters and avatar paths.
    users (id) {
        id -> Uuid,
        /// Unique login/display handle.
        username -> Varchar,
        /// Storage path of the original avatar.
        avatar -> Varchar,
        avatar_small_size1 -> Varchar,
        avatar_small_size2 -> Varchar,
        avatar_small_size3 -> Varchar,
        /// Cached aggregate: likes across the user's posts and comments.
        reputation -> Int4,
        /// Cached aggregate: number of posts authored.
        posts_count -> Int4,
        /// Cached aggregate: number of comments authored.
        comments_count -> Int4,
        /// Written by the periodic presence sync.
        last_seen -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Forum posts (authoritative side, owned by the CRUD layer).
    posts (id) {
        id -> Uuid,
        author_id -> Uuid,
        title -> Varchar,
        body -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Comments on posts, optionally replying to another comment.
    comments (id) {
        id -> Uuid,
        post_id -> Uuid,
        author_id -> Uuid,
        reply_to -> Nullable<Uuid>,
        body -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Likes, polymorphic over posts and comments.
    likes (id) {
        id -> Uuid,
        user_id -> Uuid,
        /// `post` or `comment`.
        content_kind -> Varchar,
        object_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Notifications owned by their recipient.
    notifications (id) {
        id -> Uuid,
        recipient_id -> Uuid,
        actor_id -> Uuid,
        kind -> Varchar,
        /// Kind of the related object; the object itself may be gone.
        related_kind -> Nullable<Varchar>,
        related_id -> Nullable<Uuid>,
        message -> Varchar,
        is_read -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(posts -> users (author_id));
diesel::joinable!(comments -> posts (post_id));
diesel::joinable!(notifications -> users (recipient_id));

diesel::allow_tables_to_appear_in_same_query!(users, posts, comments, likes, notifications);
