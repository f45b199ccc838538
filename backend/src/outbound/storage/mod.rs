//! Filesystem implementation of the `ObjectStorage` port.
//!
//! Object paths (`avatars/<user_id>/<token>.<ext>`) map directly onto
//! files under a configured root. Deletes are idempotent and listing walks
//! the prefix recursively, mirroring what an S3-style backend would do.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::domain::ports::{ObjectStorage, ObjectStorageError};

/// Filesystem adapter for the object storage port.
#[derive(Debug, Clone)]
pub struct FsObjectStorage {
    root: PathBuf,
}

impl FsObjectStorage {
    /// Create an adapter rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object path, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, ObjectStorageError> {
        if path.is_empty()
            || path.starts_with('/')
            || path.split('/').any(|part| part == "..")
        {
            return Err(ObjectStorageError::io(format!(
                "refusing suspicious object path: {path}"
            )));
        }
        Ok(self.root.join(path))
    }
}

fn map_io_error(error: std::io::Error) -> ObjectStorageError {
    ObjectStorageError::io(error.to_string())
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), ObjectStorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(map_io_error)?;
        }
        fs::write(target, bytes).await.map_err(map_io_error)
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, ObjectStorageError> {
        let target = self.resolve(path)?;
        match fs::read(target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(map_io_error(error)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, ObjectStorageError> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(target).await.map_err(map_io_error)?)
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStorageError> {
        let target = self.resolve(path)?;
        match fs::remove_file(target).await {
            Ok(()) => Ok(()),
            // Deleting an already-absent object is a success.
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(map_io_error(error)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStorageError> {
        let base = self.resolve(prefix.trim_end_matches('/'))?;
        if !fs::try_exists(&base).await.map_err(map_io_error)? {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut pending = vec![base];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(map_io_error)?;
            while let Some(entry) = entries.next_entry().await.map_err(map_io_error)? {
                let entry_path = entry.path();
                let file_type = entry.file_type().await.map_err(map_io_error)?;
                if file_type.is_dir() {
                    pending.push(entry_path);
                } else if let Some(relative) = relative_object_path(&self.root, &entry_path) {
                    found.push(relative);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Render a filesystem path back into a `/`-separated object path.
fn relative_object_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn storage() -> (FsObjectStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        (FsObjectStorage::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (storage, _dir) = storage();
        storage
            .put("avatars/u/tok.png", b"pixels")
            .await
            .expect("put succeeds");

        let fetched = storage.get("avatars/u/tok.png").await.expect("get succeeds");
        assert_eq!(fetched.as_deref(), Some(&b"pixels"[..]));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (storage, _dir) = storage();
        storage.put("avatars/u/tok.png", b"x").await.expect("put succeeds");

        storage.delete("avatars/u/tok.png").await.expect("first delete");
        storage.delete("avatars/u/tok.png").await.expect("second delete");
        assert!(!storage.exists("avatars/u/tok.png").await.expect("exists answers"));
    }

    #[tokio::test]
    async fn list_returns_slash_separated_paths_under_the_prefix() {
        let (storage, _dir) = storage();
        storage.put("avatars/a/one.png", b"1").await.expect("put succeeds");
        storage.put("avatars/a/two.png", b"2").await.expect("put succeeds");
        storage.put("avatars/b/other.png", b"3").await.expect("put succeeds");

        let listed = storage.list("avatars/a/").await.expect("list succeeds");
        assert_eq!(
            listed,
            vec!["avatars/a/one.png".to_owned(), "avatars/a/two.png".to_owned()]
        );
    }

    #[tokio::test]
    async fn listing_a_missing_prefix_is_empty() {
        let (storage, _dir) = storage();
        assert!(storage.list("avatars/none/").await.expect("list succeeds").is_empty());
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("/abs/path")]
    #[case("a/../../b")]
    fn suspicious_paths_are_refused(#[case] path: &str) {
        let (storage, _dir) = storage();
        assert!(storage.resolve(path).is_err());
    }
}
