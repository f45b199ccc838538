//! Web-tier entry point: HTTP endpoints, the notification WebSocket, and
//! the pub/sub bridge feeding connected sessions.

use std::env;
use std::sync::Arc;

use actix_web::cookie::Key;
use actix_web::{web, App, HttpServer};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use backend::domain::outbox::TaskSubmitter;
use backend::domain::presence::PresenceTracker;
use backend::domain::NotificationService;
use backend::inbound::http::HttpState;
use backend::inbound::ws::state::WsState;
use backend::outbound::cache::{connect_redis, RedisDedupGuard, RedisPresenceStore};
use backend::outbound::persistence::{
    run_migrations, DbPool, DieselNotificationRepository, PoolConfig,
};
use backend::outbound::queue::{task_storage, ApalisTaskQueue};
use backend::outbound::realtime::{run_pubsub_bridge, RealtimeHub};
use backend::server::{self, session_middleware, AppConfig};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    {
        let database_url = config.database_url.clone();
        tokio::task::spawn_blocking(move || run_migrations(&database_url))
            .await
            .map_err(std::io::Error::other)?
            .map_err(std::io::Error::other)?;
    }

    let db_pool = DbPool::new(PoolConfig::new(&config.database_url))
        .await
        .map_err(std::io::Error::other)?;
    let redis_pool = connect_redis(&config.redis_url)
        .await
        .map_err(std::io::Error::other)?;
    let sqlx_pool = sqlx::PgPool::connect(&config.database_url)
        .await
        .map_err(std::io::Error::other)?;
    let storage = task_storage(sqlx_pool)
        .await
        .map_err(std::io::Error::other)?;

    let submitter = TaskSubmitter::new(
        Arc::new(ApalisTaskQueue::new(storage)),
        Arc::new(RedisDedupGuard::new(redis_pool.clone())),
    );
    let notifications = NotificationService::new(
        Arc::new(DieselNotificationRepository::new(db_pool)),
        submitter,
    );
    let presence = PresenceTracker::new(Arc::new(RedisPresenceStore::new(redis_pool)));
    let hub = Arc::new(RealtimeHub::new());

    // Bridge worker-published unread counts into this process's sessions.
    let pubsub_client = bb8_redis::redis::Client::open(config.redis_url.clone())
        .map_err(std::io::Error::other)?;
    tokio::spawn(run_pubsub_bridge(pubsub_client, hub.clone()));

    let key = session_key()?;
    let cookie_secure = env::var("SESSION_COOKIE_SECURE")
        .map(|v| v != "0")
        .unwrap_or(true);

    let ws_state = web::Data::new(WsState::new(presence, hub));
    let http_state = web::Data::new(HttpState::new(notifications));

    HttpServer::new(move || {
        App::new()
            .app_data(ws_state.clone())
            .app_data(http_state.clone())
            .wrap(session_middleware(key.clone(), cookie_secure))
            .configure(server::configure)
    })
    .bind(config.bind_addr)?
    .run()
    .await
}

/// Load the cookie-signing key, tolerating an ephemeral key in development.
fn session_key() -> std::io::Result<Key> {
    let key_path =
        env::var("SESSION_KEY_FILE").unwrap_or_else(|_| "/var/run/secrets/session_key".into());
    match std::fs::read(&key_path) {
        Ok(bytes) => Ok(Key::derive_from(&bytes)),
        Err(e) => {
            let allow_dev = env::var("SESSION_ALLOW_EPHEMERAL").ok().as_deref() == Some("1");
            if cfg!(debug_assertions) || allow_dev {
                warn!(path = %key_path, error = %e, "using temporary session key (dev only)");
                Ok(Key::generate())
            } else {
                Err(std::io::Error::other(format!(
                    "failed to read session key at {key_path}: {e}"
                )))
            }
        }
    }
}
