//! HTTP inbound adapter: notification maintenance endpoints.
//!
//! Thin handlers over [`NotificationService`]; request handling ends at
//! the row mutation, and the unread-count push the mutation schedules runs
//! entirely off the request path.

use actix_session::Session as AuthSession;
use actix_web::{delete, get, post, web, HttpResponse};
use tracing::error;
use uuid::Uuid;

use crate::domain::ids::{NotificationId, UserId};
use crate::domain::notification_service::NotificationService;
use crate::domain::ports::NotificationRepositoryError;

/// Dependency bundle for the notification endpoints.
#[derive(Clone)]
pub struct HttpState {
    pub notifications: NotificationService,
}

impl HttpState {
    /// Construct state from the notification service.
    pub fn new(notifications: NotificationService) -> Self {
        Self { notifications }
    }
}

fn authenticated_user(auth: &AuthSession) -> actix_web::Result<UserId> {
    match auth.get::<Uuid>("user_id") {
        Ok(Some(id)) => Ok(UserId::from_uuid(id)),
        _ => Err(actix_web::error::ErrorUnauthorized("login required")),
    }
}

fn internal(error: &NotificationRepositoryError) -> actix_web::Error {
    error!(error = %error, "notification operation failed");
    actix_web::error::ErrorInternalServerError("notification operation failed")
}

/// Current unread count, for the badge's initial render.
#[get("/notifications/unread-count")]
pub async fn unread_count(
    state: web::Data<HttpState>,
    auth: AuthSession,
) -> actix_web::Result<HttpResponse> {
    let user = authenticated_user(&auth)?;
    let count = state
        .notifications
        .unread_count(user)
        .await
        .map_err(|e| internal(&e))?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "unread_notifications_count": count })))
}

/// Mark one owned notification read. Marking an already-read row is a
/// no-op success, matching the idempotent task semantics elsewhere.
#[post("/notifications/{id}/read")]
pub async fn mark_read(
    state: web::Data<HttpState>,
    auth: AuthSession,
    path: web::Path<Uuid>,
) -> actix_web::Result<HttpResponse> {
    let user = authenticated_user(&auth)?;
    let id = NotificationId::from_uuid(path.into_inner());
    state
        .notifications
        .mark_read(id, user)
        .await
        .map_err(|e| internal(&e))?;
    Ok(HttpResponse::NoContent().finish())
}

/// Mark everything read; the follow-up push refreshes the badge only.
#[post("/notifications/read-all")]
pub async fn mark_all_read(
    state: web::Data<HttpState>,
    auth: AuthSession,
) -> actix_web::Result<HttpResponse> {
    let user = authenticated_user(&auth)?;
    state
        .notifications
        .mark_all_read(user)
        .await
        .map_err(|e| internal(&e))?;
    Ok(HttpResponse::NoContent().finish())
}

/// Delete one owned notification.
#[delete("/notifications/{id}")]
pub async fn delete_notification(
    state: web::Data<HttpState>,
    auth: AuthSession,
    path: web::Path<Uuid>,
) -> actix_web::Result<HttpResponse> {
    let user = authenticated_user(&auth)?;
    let id = NotificationId::from_uuid(path.into_inner());
    let deleted = state
        .notifications
        .delete(id, user)
        .await
        .map_err(|e| internal(&e))?;
    if deleted {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Ok(HttpResponse::NotFound().finish())
    }
}

/// Delete every notification of the current user.
#[delete("/notifications")]
pub async fn delete_all_notifications(
    state: web::Data<HttpState>,
    auth: AuthSession,
) -> actix_web::Result<HttpResponse> {
    let user = authenticated_user(&auth)?;
    state
        .notifications
        .delete_all(user)
        .await
        .map_err(|e| internal(&e))?;
    Ok(HttpResponse::NoContent().finish())
}
