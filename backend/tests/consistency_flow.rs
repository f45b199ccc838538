//! End-to-end behaviour of the outbox, fan-out, dedup, and counter
//! reconciliation over the in-memory world.

mod support;

use backend::domain::events::{ContentEvents, LikeSnapshot, LikeTarget, PostSnapshot};
use backend::domain::ids::{ContentRef, LikeId, UserId};
use backend::domain::notification::NotificationKind;
use backend::domain::outbox::Outbox;
use backend::domain::ports::UserRepository;
use backend::domain::tasks::TaskMessage;

use support::Harness;

fn like_on_post(
    id: LikeId,
    liker: UserId,
    liker_username: &str,
    post: &PostSnapshot,
) -> LikeSnapshot {
    LikeSnapshot {
        id,
        liker_id: liker,
        liker_username: liker_username.to_owned(),
        target: LikeTarget::Post {
            id: post.id,
            author_id: post.author_id,
            title: post.title.clone(),
        },
    }
}

#[tokio::test]
async fn self_like_produces_a_first_person_notification() {
    let harness = Harness::new();
    let author = harness.forum.add_user("author");
    let post_id = harness.forum.add_post(author);
    let post = PostSnapshot {
        id: post_id,
        author_id: author,
        title: "Ship it".to_owned(),
    };
    let like_id = harness.forum.add_like(ContentRef::post(post_id));
    let events = ContentEvents::new(harness.forum.clone());

    let mut outbox = Outbox::new();
    events
        .on_like_created(&mut outbox, &like_on_post(like_id, author, "author", &post))
        .await;
    outbox.commit(&harness.submitter).await;
    harness.run_until_idle().await;

    let notifications = harness.forum.notifications_for(author);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::PostLike);
    assert!(notifications[0].message.contains("your own post"));
    assert!(!notifications[0].message.contains("author liked"));

    // The insert triggered exactly one push carrying the fresh count.
    let published = harness.realtime.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1.unread_notifications_count, 1);
}

#[tokio::test]
async fn deleting_the_target_before_the_task_runs_creates_nothing() {
    let harness = Harness::new();
    let author = harness.forum.add_user("author");
    let liker = harness.forum.add_user("visitor");
    let post_id = harness.forum.add_post(author);
    let post = PostSnapshot {
        id: post_id,
        author_id: author,
        title: "Soon deleted".to_owned(),
    };
    let like_id = harness.forum.add_like(ContentRef::post(post_id));
    let events = ContentEvents::new(harness.forum.clone());

    let mut outbox = Outbox::new();
    events
        .on_like_created(&mut outbox, &like_on_post(like_id, liker, "visitor", &post))
        .await;
    outbox.commit(&harness.submitter).await;

    // The like disappears between event emission and task execution.
    harness.forum.remove_like(like_id);
    harness.run_until_idle().await;

    assert!(harness.forum.notifications_for(author).is_empty());
    assert!(harness.realtime.published().is_empty());
}

#[tokio::test]
async fn rolled_back_transactions_fire_nothing() {
    let harness = Harness::new();
    let author = harness.forum.add_user("author");
    let post_id = harness.forum.add_post(author);
    let events = ContentEvents::new(harness.forum.clone());

    let mut outbox = Outbox::new();
    events
        .on_post_created(
            &mut outbox,
            &PostSnapshot {
                id: post_id,
                author_id: author,
                title: "Never committed".to_owned(),
            },
        )
        .await;
    outbox.rollback();
    harness.run_until_idle().await;

    assert!(harness.forum.notifications_for(author).is_empty());
}

#[tokio::test]
async fn back_to_back_pushes_execute_once() {
    let harness = Harness::new();
    let recipient = harness.forum.add_user("recipient");
    let push = TaskMessage::PushUnreadCount {
        recipient_id: recipient,
        update_list: true,
    };

    assert!(harness.submitter.submit(&push).await);
    assert!(!harness.submitter.submit(&push).await);
    harness.run_until_idle().await;

    assert_eq!(harness.realtime.published().len(), 1);

    // Once the push ran, the lease is free and a new trigger queues again.
    assert!(harness.submitter.submit(&push).await);
    harness.run_until_idle().await;
    assert_eq!(harness.realtime.published().len(), 2);
}

#[tokio::test]
async fn counters_follow_the_like_lifecycle_through_reconciliation() {
    let harness = Harness::new();
    let author = harness.forum.add_user("x");
    let visitor = harness.forum.add_user("y");
    let events = ContentEvents::new(harness.forum.clone());

    // X creates a post.
    let post_id = harness.forum.add_post(author);
    let post = PostSnapshot {
        id: post_id,
        author_id: author,
        title: "First post".to_owned(),
    };
    let mut outbox = Outbox::new();
    events.on_post_created(&mut outbox, &post).await;
    outbox.commit(&harness.submitter).await;
    harness.run_until_idle().await;

    harness.submitter.submit(&TaskMessage::ReconcileUserCounters { batch_size: 10 }).await;
    harness.run_until_idle().await;
    assert_eq!(harness.forum.snapshot(author).posts_count, 1);

    // Y likes it.
    let like_id = harness.forum.add_like(ContentRef::post(post_id));
    let mut outbox = Outbox::new();
    events
        .on_like_created(&mut outbox, &like_on_post(like_id, visitor, "y", &post))
        .await;
    outbox.commit(&harness.submitter).await;
    harness.run_until_idle().await;
    assert_eq!(harness.forum.snapshot(author).reputation, 1);

    // Y un-likes it.
    harness.forum.remove_like(like_id);
    let mut outbox = Outbox::new();
    events
        .on_like_deleted(&mut outbox, &like_on_post(like_id, visitor, "y", &post))
        .await;
    outbox.commit(&harness.submitter).await;
    harness.run_until_idle().await;
    assert_eq!(harness.forum.snapshot(author).reputation, 0);

    // Deleting the post cascades the likes; reconciliation settles at zero.
    harness.forum.remove_post_cascading(post_id);
    let mut outbox = Outbox::new();
    events.on_post_deleted(&mut outbox, &post).await;
    outbox.commit(&harness.submitter).await;
    harness.submitter.submit(&TaskMessage::ReconcileUserCounters { batch_size: 10 }).await;
    harness.run_until_idle().await;

    let snapshot = harness.forum.snapshot(author);
    assert_eq!(snapshot.posts_count, 0);
    assert_eq!(snapshot.reputation, 0);
}

#[tokio::test]
async fn reconciliation_heals_arbitrary_drift_and_is_idempotent() {
    let harness = Harness::new();
    let author = harness.forum.add_user("drifted");
    harness.forum.add_post(author);
    harness.forum.add_post(author);

    // Simulate missed events: the snapshot says something absurd.
    harness
        .forum
        .write_counter_snapshots(&[backend::domain::counters::CounterSnapshot {
            user_id: author,
            posts_count: 40,
            comments_count: 7,
            reputation: 99,
        }])
        .await
        .expect("seed drift");

    let outcome = harness.ctx.reconciler.run(1000).await.expect("first run");
    assert_eq!(outcome.updated, 1);
    let snapshot = harness.forum.snapshot(author);
    assert_eq!(
        (snapshot.posts_count, snapshot.comments_count, snapshot.reputation),
        (2, 0, 0)
    );

    let second = harness.ctx.reconciler.run(1000).await.expect("second run");
    assert_eq!(second.updated, 0);
}
