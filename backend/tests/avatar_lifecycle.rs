//! Avatar generations through change and account deletion: the superseded
//! files disappear, the defaults survive.

mod support;

use std::io::Cursor;

use backend::domain::avatars::{
    original_path, thumbnail_path, AvatarPaths, DEFAULT_AVATAR,
};
use backend::domain::events::{ContentEvents, UserSnapshot};
use backend::domain::outbox::Outbox;
use backend::domain::ports::ObjectStorage;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

use support::Harness;

fn png_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_pixel(64, 64, Rgb::<u8>([10, 90, 160]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("png encodes");
    buffer.into_inner()
}

fn generation(user: backend::domain::ids::UserId, token: &str) -> AvatarPaths {
    let original = original_path(user, token, "png");
    AvatarPaths {
        thumbnails: [0, 1, 2].map(|slot| thumbnail_path(&original, slot).expect("path derives")),
        original,
    }
}

#[tokio::test]
async fn changing_and_deleting_leaves_no_generation_behind() {
    let harness = Harness::new();
    let user = harness.forum.add_user("painter");
    let events = ContentEvents::new(harness.forum.clone());

    harness
        .storage
        .put(DEFAULT_AVATAR, b"default")
        .await
        .expect("seed default");

    // Generation A: upload, thumbnails generated.
    let gen_a = generation(user, "aaaa");
    harness.storage.put(&gen_a.original, &png_bytes()).await.expect("seed A");
    harness.forum.set_avatar(
        user,
        AvatarPaths {
            original: gen_a.original.clone(),
            thumbnails: AvatarPaths::default_set().thumbnails,
        },
    );
    let mut outbox = Outbox::new();
    events.on_avatar_uploaded(&mut outbox, user, Vec::new());
    outbox.commit(&harness.submitter).await;
    harness.run_until_idle().await;

    for slot in 0..3 {
        let path = thumbnail_path(&gen_a.original, slot).expect("path derives");
        assert!(harness.storage.exists(&path).await.expect("exists answers"));
    }

    // Generation B supersedes A; A's files are chained for deletion after
    // B's thumbnails are written.
    let gen_b = generation(user, "bbbb");
    harness.storage.put(&gen_b.original, &png_bytes()).await.expect("seed B");
    let superseded = generation(user, "aaaa").deletable();
    harness.forum.set_avatar(
        user,
        AvatarPaths {
            original: gen_b.original.clone(),
            thumbnails: AvatarPaths::default_set().thumbnails,
        },
    );
    let mut outbox = Outbox::new();
    events.on_avatar_uploaded(&mut outbox, user, superseded);
    outbox.commit(&harness.submitter).await;
    harness.run_until_idle().await;

    assert!(!harness.storage.exists(&gen_a.original).await.expect("exists answers"));
    for slot in 0..3 {
        let a_thumb = thumbnail_path(&gen_a.original, slot).expect("path derives");
        assert!(!harness.storage.exists(&a_thumb).await.expect("exists answers"));
        let b_thumb = thumbnail_path(&gen_b.original, slot).expect("path derives");
        assert!(harness.storage.exists(&b_thumb).await.expect("exists answers"));
    }

    // Deleting the account removes generation B too. The snapshot is taken
    // before the row goes away, as the CRUD layer would.
    let snapshot = UserSnapshot {
        id: user,
        username: "painter".to_owned(),
        avatar: generation(user, "bbbb"),
    };
    harness.forum.remove_user(user);
    let mut outbox = Outbox::new();
    events.on_user_deleted(&mut outbox, &snapshot);
    outbox.commit(&harness.submitter).await;
    harness.run_until_idle().await;

    let leftovers = harness
        .storage
        .list(&backend::domain::avatars::user_prefix(user))
        .await
        .expect("list answers");
    assert!(leftovers.is_empty(), "orphaned files remain: {leftovers:?}");
    assert!(harness.storage.exists(DEFAULT_AVATAR).await.expect("exists answers"));
}

#[tokio::test]
async fn resetting_to_the_default_only_deletes_the_old_generation() {
    let harness = Harness::new();
    let user = harness.forum.add_user("minimalist");
    let events = ContentEvents::new(harness.forum.clone());

    let gen = generation(user, "cccc");
    harness.storage.put(&gen.original, &png_bytes()).await.expect("seed original");
    harness.forum.set_avatar(user, gen.clone());
    harness.forum.set_avatar(user, AvatarPaths::default_set());

    let mut outbox = Outbox::new();
    events.on_avatar_removed(&mut outbox, user, gen.deletable());
    outbox.commit(&harness.submitter).await;
    harness.run_until_idle().await;

    assert!(!harness.storage.exists(&gen.original).await.expect("exists answers"));
}
