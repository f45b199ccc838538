//! Apalis job-queue adapter over PostgreSQL.
//!
//! All background work travels as one job type, [`TaskMessage`], through a
//! single PostgreSQL-backed queue; the worker binary dispatches on the
//! enum. Retry policy and failure accounting stay with Apalis; this layer
//! adds nothing on top.

use apalis::prelude::Storage;
use apalis_sql::postgres::PostgresStorage;
use async_trait::async_trait;

use crate::domain::ports::{TaskDispatchError, TaskQueue};
use crate::domain::tasks::TaskMessage;

/// Storage type shared by the enqueue adapter and the worker binary.
pub type TaskStorage = PostgresStorage<TaskMessage>;

/// Run the Apalis schema migrations and build the task storage.
///
/// # Errors
///
/// Returns the underlying sqlx error when the migrations cannot run.
pub async fn task_storage(pool: sqlx::PgPool) -> Result<TaskStorage, sqlx::Error> {
    PostgresStorage::setup(&pool).await?;
    Ok(PostgresStorage::new(pool))
}

/// Apalis-backed implementation of the `TaskQueue` port.
#[derive(Clone)]
pub struct ApalisTaskQueue {
    storage: TaskStorage,
}

impl ApalisTaskQueue {
    /// Create an adapter over the given storage.
    pub fn new(storage: TaskStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TaskQueue for ApalisTaskQueue {
    async fn enqueue(&self, message: &TaskMessage) -> Result<(), TaskDispatchError> {
        let mut storage = self.storage.clone();
        storage
            .push(message.clone())
            .await
            .map(|_| ())
            .map_err(|err| TaskDispatchError::unavailable(err.to_string()))
    }
}
