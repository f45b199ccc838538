//! Avatar lifecycle task handlers.
//!
//! Generation and deletion are chained, never parallel: the thumbnail task
//! submits the delete task for the superseded generation only after it has
//! finished writing, so cleanup can never race a file that is about to be
//! rewritten. Every delete is idempotent and system defaults are refused
//! at the last line of defence.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn};

use crate::domain::avatars::{
    is_default_path, orphaned_paths, original_path, thumbnail_path, user_prefix, THUMBNAIL_SIZES,
};
use crate::domain::ids::UserId;
use crate::domain::tasks::TaskMessage;

use super::context::WorkerContext;

/// Regenerate the user's thumbnails, then chain deletion of the superseded
/// generation.
pub(crate) async fn generate_avatar_thumbnails(
    ctx: &WorkerContext,
    user_id: UserId,
    superseded: Vec<String>,
) {
    let record = match ctx.users.find_avatar(user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(%user_id, "user gone; thumbnails not generated");
            return;
        }
        Err(error) => {
            warn!(%user_id, error = %error, "avatar lookup failed; thumbnails not generated");
            return;
        }
    };

    if !record.avatar.is_default() {
        if let Some(thumbnails) = generate_sizes(ctx, &record.avatar.original, &record.avatar.thumbnails).await {
            if let Err(error) = ctx.users.set_avatar_thumbnails(user_id, &thumbnails).await {
                warn!(%user_id, error = %error, "failed to record generated thumbnail paths");
            }
        }
    }

    // Deletion of the old generation runs strictly after generation.
    if !superseded.is_empty() {
        ctx.submitter
            .submit(&TaskMessage::DeleteStoragePaths {
                user_id,
                paths: Some(superseded),
            })
            .await;
    }
}

/// Produce each configured size, skipping slots that already exist and
/// isolating per-size failures. Returns the resulting path array, or
/// `None` when the source could not be read at all.
async fn generate_sizes(
    ctx: &WorkerContext,
    original: &str,
    current: &[String; 3],
) -> Option<[String; 3]> {
    let bytes = match ctx.storage.get(original).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            warn!(original, "original avatar missing from storage");
            return None;
        }
        Err(error) => {
            warn!(original, error = %error, "failed to read original avatar");
            return None;
        }
    };

    let source = match image::load_from_memory(&bytes) {
        Ok(source) => source,
        Err(error) => {
            warn!(original, error = %error, "unreadable avatar image; no thumbnails generated");
            return None;
        }
    };

    let mut result = current.clone();
    for (slot, (width, height)) in THUMBNAIL_SIZES.iter().enumerate() {
        let Some(target) = thumbnail_path(original, slot) else {
            warn!(original, slot, "cannot derive thumbnail path");
            continue;
        };

        // An existing up-to-date thumbnail is not regenerated.
        match ctx.storage.exists(&target).await {
            Ok(true) => {
                if let Some(entry) = result.get_mut(slot) {
                    *entry = target;
                }
                continue;
            }
            Ok(false) => {}
            Err(error) => {
                warn!(target, error = %error, "thumbnail existence check failed; skipping size");
                continue;
            }
        }

        // One corrupt size must not abort the remaining sizes.
        match encode_resized(&source, *width, *height, &target) {
            Ok(encoded) => match ctx.storage.put(&target, &encoded).await {
                Ok(()) => {
                    debug!(target, "thumbnail written");
                    if let Some(entry) = result.get_mut(slot) {
                        *entry = target;
                    }
                }
                Err(error) => warn!(target, error = %error, "thumbnail write failed; skipping size"),
            },
            Err(error) => warn!(target, error = %error, "thumbnail encode failed; skipping size"),
        }
    }
    Some(result)
}

fn encode_resized(
    source: &DynamicImage,
    width: u32,
    height: u32,
    target: &str,
) -> Result<Vec<u8>, image::ImageError> {
    let format = target
        .rsplit('.')
        .next()
        .and_then(ImageFormat::from_extension)
        .unwrap_or(ImageFormat::Png);

    let resized = source.thumbnail(width, height);
    // JPEG has no alpha channel; flatten before encoding.
    let resized = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(resized.to_rgb8())
    } else {
        resized
    };

    let mut buffer = Cursor::new(Vec::new());
    resized.write_to(&mut buffer, format)?;
    Ok(buffer.into_inner())
}

/// Delete the given paths, or sweep the user's prefix for orphans when no
/// explicit list was recorded.
pub(crate) async fn delete_storage_paths(
    ctx: &WorkerContext,
    user_id: UserId,
    paths: Option<Vec<String>>,
) {
    let targets = match paths {
        Some(paths) => paths,
        None => match sweep_targets(ctx, user_id).await {
            Some(paths) => paths,
            None => return,
        },
    };

    for path in targets {
        if is_default_path(&path) {
            // Defaults are shared by every user and never deleted.
            debug!(path, "refusing to delete a system default");
            continue;
        }
        match ctx.storage.delete(&path).await {
            Ok(()) => debug!(path, "storage path deleted"),
            Err(error) => warn!(path, error = %error, "storage delete failed; orphan remains"),
        }
    }
}

/// Fallback for tasks that ran out of order or crashed mid-sequence: list
/// the whole per-user prefix and delete everything the live row does not
/// reference.
async fn sweep_targets(ctx: &WorkerContext, user_id: UserId) -> Option<Vec<String>> {
    let record = match ctx.users.find_avatar(user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(%user_id, "user gone; orphan sweep skipped");
            return None;
        }
        Err(error) => {
            warn!(%user_id, error = %error, "avatar lookup failed; orphan sweep skipped");
            return None;
        }
    };

    let listing = match ctx.storage.list(&user_prefix(user_id)).await {
        Ok(listing) => listing,
        Err(error) => {
            warn!(%user_id, error = %error, "prefix listing failed; orphan sweep skipped");
            return None;
        }
    };

    let orphans = orphaned_paths(&listing, &record.avatar);
    info!(%user_id, orphans = orphans.len(), "orphan sweep computed");
    Some(orphans)
}

/// Maximum accepted size for a downloaded social avatar.
const DOWNLOAD_LIMIT_BYTES: usize = 5 * 1024 * 1024;

/// Fetch a social-login avatar and install it as a fresh generation.
///
/// Skipped when the user already replaced the default avatar; their own
/// upload always wins over the provider image.
pub(crate) async fn download_and_set_avatar(ctx: &WorkerContext, user_id: UserId, url: String) {
    let record = match ctx.users.find_avatar(user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(%user_id, "user gone; avatar not downloaded");
            return;
        }
        Err(error) => {
            warn!(%user_id, error = %error, "avatar lookup failed; avatar not downloaded");
            return;
        }
    };
    if !record.avatar.is_default() {
        debug!(%user_id, "user already has a custom avatar; keeping it");
        return;
    }

    match url::Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => {
            warn!(%user_id, scheme = parsed.scheme(), "refusing non-HTTP avatar url");
            return;
        }
        Err(error) => {
            warn!(%user_id, url, error = %error, "unparsable avatar url");
            return;
        }
    }

    let bytes = match fetch_avatar_bytes(ctx, &url).await {
        Some(bytes) => bytes,
        None => return,
    };

    let Ok(format) = image::guess_format(&bytes) else {
        warn!(%user_id, url, "downloaded avatar is not a recognised image");
        return;
    };
    let ext = format.extensions_str().first().copied().unwrap_or("jpg");

    let token = uuid::Uuid::new_v4().simple().to_string();
    let path = original_path(user_id, &token, ext);
    if let Err(error) = ctx.storage.put(&path, &bytes).await {
        warn!(%user_id, error = %error, "failed to store downloaded avatar");
        return;
    }
    if let Err(error) = ctx.users.set_avatar_original(user_id, &path).await {
        warn!(%user_id, error = %error, "failed to install downloaded avatar");
        return;
    }
    info!(%user_id, path, "social avatar installed");

    ctx.submitter
        .submit(&TaskMessage::GenerateAvatarThumbnails {
            user_id,
            superseded: Vec::new(),
        })
        .await;
}

async fn fetch_avatar_bytes(ctx: &WorkerContext, url: &str) -> Option<Vec<u8>> {
    let response = match ctx.http.get(url).send().await.and_then(|r| r.error_for_status()) {
        Ok(response) => response,
        Err(error) => {
            warn!(url, error = %error, "avatar download failed");
            return None;
        }
    };
    match response.bytes().await {
        Ok(bytes) if bytes.len() <= DOWNLOAD_LIMIT_BYTES => Some(bytes.to_vec()),
        Ok(bytes) => {
            warn!(url, size = bytes.len(), "downloaded avatar exceeds the size limit");
            None
        }
        Err(error) => {
            warn!(url, error = %error, "avatar body read failed");
            None
        }
    }
}
