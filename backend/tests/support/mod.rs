//! Shared in-memory world for the end-to-end consistency tests.
//!
//! `InMemoryForum` plays the authoritative relational store: posts,
//! comments, likes, users, and notifications live in mutex-guarded maps,
//! and the repository ports are answered from them the same way the SQL
//! adapters answer from PostgreSQL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use backend::domain::avatars::AvatarPaths;
use backend::domain::counters::{CounterField, CounterSnapshot};
use backend::domain::ids::{CommentId, ContentKind, ContentRef, LikeId, PostId, UserId};
use backend::domain::ids::NotificationId;
use backend::domain::notification::Notification;
use backend::domain::outbox::TaskSubmitter;
use backend::domain::ports::{
    ContentRepository, ContentRepositoryError, FixtureDedupGuard, FixtureObjectStorage,
    FixturePresenceStore, FixtureRealtimePublisher, FixtureTaskQueue, NewNotification,
    NotificationRepository, NotificationRepositoryError, OwnerCount, UserAvatarRecord,
    UserRepository, UserRepositoryError,
};
use backend::domain::presence::PresenceTracker;
use backend::workers::{dispatch, WorkerContext};

#[derive(Debug, Clone)]
pub struct StoredPost {
    pub author_id: UserId,
}

#[derive(Debug, Clone)]
pub struct StoredComment {
    pub author_id: UserId,
}

#[derive(Debug, Clone)]
pub struct StoredLike {
    pub target: ContentRef,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub snapshot: CounterSnapshot,
    pub avatar: AvatarPaths,
    pub username: String,
}

#[derive(Default)]
struct ForumState {
    users: HashMap<UserId, StoredUser>,
    posts: HashMap<PostId, StoredPost>,
    comments: HashMap<CommentId, StoredComment>,
    likes: HashMap<LikeId, StoredLike>,
    notifications: Vec<Notification>,
}

/// In-memory stand-in for the relational store.
#[derive(Default)]
pub struct InMemoryForum {
    state: Mutex<ForumState>,
}

impl InMemoryForum {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, ForumState> {
        self.state.lock().expect("forum lock")
    }

    pub fn add_user(&self, username: &str) -> UserId {
        let id = UserId::random();
        self.lock().users.insert(
            id,
            StoredUser {
                snapshot: CounterSnapshot {
                    user_id: id,
                    posts_count: 0,
                    comments_count: 0,
                    reputation: 0,
                },
                avatar: AvatarPaths::default_set(),
                username: username.to_owned(),
            },
        );
        id
    }

    pub fn add_post(&self, author_id: UserId) -> PostId {
        let id = PostId::random();
        self.lock().posts.insert(id, StoredPost { author_id });
        id
    }

    pub fn add_like(&self, target: ContentRef) -> LikeId {
        let id = LikeId::random();
        self.lock().likes.insert(id, StoredLike { target });
        id
    }

    pub fn remove_like(&self, id: LikeId) {
        self.lock().likes.remove(&id);
    }

    /// Delete a post and everything hanging off it, the way the CRUD
    /// layer's cascade would.
    pub fn remove_post_cascading(&self, id: PostId) {
        let mut state = self.lock();
        state.posts.remove(&id);
        let post_ref = ContentRef::post(id);
        state.likes.retain(|_, like| like.target != post_ref);
    }

    pub fn set_avatar(&self, user: UserId, avatar: AvatarPaths) {
        if let Some(stored) = self.lock().users.get_mut(&user) {
            stored.avatar = avatar;
        }
    }

    pub fn remove_user(&self, user: UserId) {
        self.lock().users.remove(&user);
    }

    pub fn snapshot(&self, user: UserId) -> CounterSnapshot {
        self.lock().users.get(&user).expect("user exists").snapshot
    }

    pub fn notifications_for(&self, user: UserId) -> Vec<Notification> {
        self.lock()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user)
            .cloned()
            .collect()
    }

    fn counts_by<K, F>(map: &HashMap<K, F>, owner: impl Fn(&F) -> Option<UserId>) -> Vec<OwnerCount> {
        let mut counts: HashMap<UserId, i64> = HashMap::new();
        for value in map.values() {
            if let Some(user) = owner(value) {
                *counts.entry(user).or_insert(0) += 1;
            }
        }
        counts.into_iter().collect()
    }
}

#[async_trait]
impl ContentRepository for InMemoryForum {
    async fn exists(&self, reference: &ContentRef) -> Result<bool, ContentRepositoryError> {
        let state = self.lock();
        Ok(match reference.kind {
            ContentKind::Post => state.posts.contains_key(&PostId::from_uuid(reference.id)),
            ContentKind::Comment => state
                .comments
                .contains_key(&CommentId::from_uuid(reference.id)),
            ContentKind::Like => state.likes.contains_key(&LikeId::from_uuid(reference.id)),
            ContentKind::User => state.users.contains_key(&UserId::from_uuid(reference.id)),
        })
    }

    async fn posts_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError> {
        let state = self.lock();
        Ok(Self::counts_by(&state.posts, |post| Some(post.author_id)))
    }

    async fn comments_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError> {
        let state = self.lock();
        Ok(Self::counts_by(&state.comments, |comment| {
            Some(comment.author_id)
        }))
    }

    async fn post_likes_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError> {
        let state = self.lock();
        let posts = &state.posts;
        Ok(Self::counts_by(&state.likes, |like| {
            (like.target.kind == ContentKind::Post)
                .then(|| posts.get(&PostId::from_uuid(like.target.id)).map(|p| p.author_id))
                .flatten()
        }))
    }

    async fn comment_likes_by_author(&self) -> Result<Vec<OwnerCount>, ContentRepositoryError> {
        let state = self.lock();
        let comments = &state.comments;
        Ok(Self::counts_by(&state.likes, |like| {
            (like.target.kind == ContentKind::Comment)
                .then(|| {
                    comments
                        .get(&CommentId::from_uuid(like.target.id))
                        .map(|c| c.author_id)
                })
                .flatten()
        }))
    }
}

#[async_trait]
impl NotificationRepository for InMemoryForum {
    async fn insert(
        &self,
        notification: &NewNotification,
    ) -> Result<NotificationId, NotificationRepositoryError> {
        let id = NotificationId::random();
        self.lock().notifications.push(Notification {
            id,
            recipient_id: notification.recipient_id,
            actor_id: notification.actor_id,
            kind: notification.kind,
            related: notification.related,
            message: notification.message.clone(),
            is_read: false,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn unread_count(&self, user: UserId) -> Result<i64, NotificationRepositoryError> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user && !n.is_read)
            .count() as i64)
    }

    async fn list_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<Notification>, NotificationRepositoryError> {
        Ok(self.notifications_for(user))
    }

    async fn mark_read(
        &self,
        id: NotificationId,
        owner: UserId,
    ) -> Result<bool, NotificationRepositoryError> {
        let mut state = self.lock();
        for notification in &mut state.notifications {
            if notification.id == id && notification.recipient_id == owner && !notification.is_read
            {
                notification.is_read = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_all_read(&self, owner: UserId) -> Result<u64, NotificationRepositoryError> {
        let mut state = self.lock();
        let mut changed = 0;
        for notification in &mut state.notifications {
            if notification.recipient_id == owner && !notification.is_read {
                notification.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(
        &self,
        id: NotificationId,
        owner: UserId,
    ) -> Result<bool, NotificationRepositoryError> {
        let mut state = self.lock();
        let before = state.notifications.len();
        state
            .notifications
            .retain(|n| !(n.id == id && n.recipient_id == owner));
        Ok(state.notifications.len() < before)
    }

    async fn delete_all(&self, owner: UserId) -> Result<u64, NotificationRepositoryError> {
        let mut state = self.lock();
        let before = state.notifications.len();
        state.notifications.retain(|n| n.recipient_id != owner);
        Ok((before - state.notifications.len()) as u64)
    }
}

#[async_trait]
impl UserRepository for InMemoryForum {
    async fn adjust_counter(
        &self,
        user: UserId,
        field: CounterField,
        delta: i32,
    ) -> Result<(), UserRepositoryError> {
        let mut state = self.lock();
        if let Some(stored) = state.users.get_mut(&user) {
            let slot = match field {
                CounterField::PostsCount => &mut stored.snapshot.posts_count,
                CounterField::CommentsCount => &mut stored.snapshot.comments_count,
                CounterField::Reputation => &mut stored.snapshot.reputation,
            };
            *slot = (*slot + delta).max(0);
        }
        Ok(())
    }

    async fn counter_snapshots(&self) -> Result<Vec<CounterSnapshot>, UserRepositoryError> {
        Ok(self.lock().users.values().map(|u| u.snapshot).collect())
    }

    async fn write_counter_snapshots(
        &self,
        snapshots: &[CounterSnapshot],
    ) -> Result<(), UserRepositoryError> {
        let mut state = self.lock();
        for snapshot in snapshots {
            if let Some(stored) = state.users.get_mut(&snapshot.user_id) {
                stored.snapshot = *snapshot;
            }
        }
        Ok(())
    }

    async fn find_avatar(
        &self,
        user: UserId,
    ) -> Result<Option<UserAvatarRecord>, UserRepositoryError> {
        Ok(self.lock().users.get(&user).map(|stored| UserAvatarRecord {
            id: user,
            username: stored.username.clone(),
            avatar: stored.avatar.clone(),
        }))
    }

    async fn set_avatar_original(
        &self,
        user: UserId,
        path: &str,
    ) -> Result<(), UserRepositoryError> {
        let mut state = self.lock();
        if let Some(stored) = state.users.get_mut(&user) {
            stored.avatar.original = path.to_owned();
        }
        Ok(())
    }

    async fn set_avatar_thumbnails(
        &self,
        user: UserId,
        thumbnails: &[String; 3],
    ) -> Result<(), UserRepositoryError> {
        let mut state = self.lock();
        if let Some(stored) = state.users.get_mut(&user) {
            stored.avatar.thumbnails = thumbnails.clone();
        }
        Ok(())
    }

    async fn touch_last_seen(
        &self,
        _users: &[UserId],
        _at: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        Ok(())
    }
}

/// A complete worker-tier wired onto the in-memory world.
pub struct Harness {
    pub forum: Arc<InMemoryForum>,
    pub queue: Arc<FixtureTaskQueue>,
    pub realtime: Arc<FixtureRealtimePublisher>,
    pub storage: Arc<FixtureObjectStorage>,
    pub submitter: TaskSubmitter,
    pub ctx: WorkerContext,
}

impl Harness {
    pub fn new() -> Self {
        let forum = InMemoryForum::new();
        let queue = Arc::new(FixtureTaskQueue::new());
        let realtime = Arc::new(FixtureRealtimePublisher::new());
        let storage = Arc::new(FixtureObjectStorage::new());
        let submitter = TaskSubmitter::new(queue.clone(), Arc::new(FixtureDedupGuard::new()));
        let ctx = WorkerContext::new(
            forum.clone(),
            forum.clone(),
            forum.clone(),
            PresenceTracker::new(Arc::new(FixturePresenceStore::new())),
            storage.clone(),
            realtime.clone(),
            submitter.clone(),
            reqwest::Client::new(),
        );
        Self {
            forum,
            queue,
            realtime,
            storage,
            submitter,
            ctx,
        }
    }

    /// Drain the queue to quiescence, executing follow-up tasks handlers
    /// submit along the way.
    pub async fn run_until_idle(&self) {
        loop {
            let batch = self.queue.submitted();
            if batch.is_empty() {
                return;
            }
            self.queue.clear();
            for message in batch {
                dispatch(&message, &self.ctx).await;
            }
        }
    }
}
