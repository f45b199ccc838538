//! Avatar file-set layout and generation bookkeeping.
//!
//! Each user references at most one generation of files at a time: an
//! original under `avatars/<user_id>/<token>.<ext>` plus three fixed-size
//! thumbnails sharing the original's stem with a `_small_size{1,2,3}`
//! suffix. System defaults live outside any per-user prefix and are never
//! deleted by cleanup. Paths superseded by an avatar change are computed at
//! mutation time so cleanup can target exactly the old generation; a prefix
//! sweep exists only as a fallback for tasks that crashed mid-sequence.

use serde::{Deserialize, Serialize};

use crate::domain::ids::UserId;

/// Default original avatar, shared by every user without an upload.
pub const DEFAULT_AVATAR: &str = "avatars/default_avatar.jpg";

/// Default thumbnails, index-aligned with [`THUMBNAIL_SIZES`].
pub const DEFAULT_THUMBNAILS: [&str; 3] = [
    "avatars/default_avatar_small_size1.jpg",
    "avatars/default_avatar_small_size2.jpg",
    "avatars/default_avatar_small_size3.jpg",
];

/// Square pixel bounds for each thumbnail slot.
pub const THUMBNAIL_SIZES: [(u32, u32); 3] = [(100, 100), (170, 170), (800, 800)];

/// The storage paths referenced by one user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarPaths {
    pub original: String,
    pub thumbnails: [String; 3],
}

impl AvatarPaths {
    /// The shared default set assigned at registration.
    pub fn default_set() -> Self {
        Self {
            original: DEFAULT_AVATAR.to_owned(),
            thumbnails: DEFAULT_THUMBNAILS.map(str::to_owned),
        }
    }

    /// Whether the original is still the system default.
    pub fn is_default(&self) -> bool {
        self.original == DEFAULT_AVATAR
    }

    /// All paths in this set, originals first.
    pub fn all(&self) -> Vec<String> {
        let mut paths = vec![self.original.clone()];
        paths.extend(self.thumbnails.iter().cloned());
        paths
    }

    /// Paths owned by this generation, excluding system defaults.
    ///
    /// This is exactly the set cleanup may delete once the generation is
    /// superseded or the user is removed.
    pub fn deletable(&self) -> Vec<String> {
        self.all().into_iter().filter(|p| !is_default_path(p)).collect()
    }
}

impl Default for AvatarPaths {
    fn default() -> Self {
        Self::default_set()
    }
}

/// Whether `path` is one of the protected system defaults.
pub fn is_default_path(path: &str) -> bool {
    path == DEFAULT_AVATAR || DEFAULT_THUMBNAILS.contains(&path)
}

/// Storage prefix holding every file of one user's avatar generations.
pub fn user_prefix(user_id: UserId) -> String {
    format!("avatars/{user_id}/")
}

/// Build the storage path for a freshly uploaded original.
pub fn original_path(user_id: UserId, token: &str, ext: &str) -> String {
    format!("avatars/{user_id}/{token}.{ext}")
}

/// Derive the thumbnail path for `slot` (0-based) from an original's path.
///
/// Returns `None` when the original has no extension to splice the suffix
/// in front of, or when `slot` is out of range.
pub fn thumbnail_path(original: &str, slot: usize) -> Option<String> {
    if slot >= THUMBNAIL_SIZES.len() {
        return None;
    }
    let dot = original.rfind('.')?;
    // A dot inside a directory component is not an extension separator.
    if original[dot..].contains('/') {
        return None;
    }
    let (stem, ext) = original.split_at(dot);
    Some(format!("{stem}_small_size{}{ext}", slot + 1))
}

/// Paths under a user's prefix that no live column references.
///
/// `listing` is the complete per-user prefix listing; `live` the paths the
/// user row currently references. Defaults never appear under a per-user
/// prefix, so everything unreferenced is fair game.
pub fn orphaned_paths(listing: &[String], live: &AvatarPaths) -> Vec<String> {
    let keep = live.all();
    listing
        .iter()
        .filter(|path| !keep.contains(path))
        .cloned()
        .collect()
}
