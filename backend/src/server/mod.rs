//! HTTP application assembly.

pub mod config;

use actix_session::storage::CookieSessionStore;
use actix_session::SessionMiddleware;
use actix_web::cookie::{Key, SameSite};
use actix_web::web;

use crate::inbound::{http, ws};

pub use config::{AppConfig, ConfigError};

/// Cookie-backed session middleware shared by HTTP and WebSocket routes.
pub fn session_middleware(
    key: Key,
    cookie_secure: bool,
) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name("session".into())
        .cookie_path("/".into())
        .cookie_secure(cookie_secure)
        .cookie_http_only(true)
        .cookie_same_site(SameSite::Lax)
        .build()
}

/// Register the consistency layer's routes.
///
/// Expects `WsState` and `HttpState` to be registered as app data by the
/// caller.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(http::unread_count)
            .service(http::mark_read)
            .service(http::mark_all_read)
            .service(http::delete_notification)
            .service(http::delete_all_notifications),
    )
    .service(ws::ws_entry);
}
