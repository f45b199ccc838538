//! PostgreSQL persistence adapters (Diesel + diesel-async).

use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

mod diesel_content_repository;
mod diesel_notification_repository;
mod diesel_user_repository;
mod map_errors;
mod models;
mod pool;
pub mod schema;

pub use diesel_content_repository::DieselContentRepository;
pub use diesel_notification_repository::DieselNotificationRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use pool::{DbPool, PoolConfig, PoolError};

/// Schema migrations bundled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Bring the schema up to date over a synchronous connection.
///
/// Runs at startup before the pools are built; call from a blocking
/// context.
///
/// # Errors
///
/// Returns [`PoolError::Build`] when the connection or a migration fails.
pub fn run_migrations(database_url: &str) -> Result<(), PoolError> {
    let mut conn = diesel::pg::PgConnection::establish(database_url)
        .map_err(|err| PoolError::build(err.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| PoolError::build(err.to_string()))?;
    Ok(())
}
