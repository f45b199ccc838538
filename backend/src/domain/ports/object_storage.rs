//! Port over the object store holding avatar files.
//!
//! Deletion is best-effort and idempotent: removing an absent path is a
//! success, so cleanup tasks can re-run after a crash without special
//! casing.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by object storage adapters.
    pub enum ObjectStorageError {
        /// The storage backend is unreachable.
        Unavailable { message: String } => "object storage is unavailable: {message}",
        /// An individual operation failed.
        Io { message: String } => "object storage operation failed: {message}",
    }
}

/// Port for avatar file storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path`, replacing any existing object.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), ObjectStorageError>;

    /// Fetch the object at `path`, or `None` when absent.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, ObjectStorageError>;

    /// Whether an object exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, ObjectStorageError>;

    /// Delete the object at `path`; absent paths succeed silently.
    async fn delete(&self, path: &str) -> Result<(), ObjectStorageError>;

    /// Paths of every object under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStorageError>;
}

/// In-memory storage for unit tests.
#[derive(Debug, Default)]
pub struct FixtureObjectStorage {
    objects: std::sync::Mutex<std::collections::BTreeMap<String, Vec<u8>>>,
}

impl FixtureObjectStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(
        &self,
    ) -> Result<
        std::sync::MutexGuard<'_, std::collections::BTreeMap<String, Vec<u8>>>,
        ObjectStorageError,
    > {
        self.objects
            .lock()
            .map_err(|_| ObjectStorageError::unavailable("fixture mutex poisoned"))
    }
}

#[async_trait]
impl ObjectStorage for FixtureObjectStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), ObjectStorageError> {
        self.lock()?.insert(path.to_owned(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, ObjectStorageError> {
        Ok(self.lock()?.get(path).cloned())
    }

    async fn exists(&self, path: &str) -> Result<bool, ObjectStorageError> {
        Ok(self.lock()?.contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStorageError> {
        self.lock()?.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStorageError> {
        Ok(self
            .lock()?
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect())
    }
}
