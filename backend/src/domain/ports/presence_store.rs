//! Port over the key-value store backing online presence.
//!
//! The store keeps a per-user TTL marker (the single source of truth for
//! liveness) and a parallel membership set enabling O(1) enumeration, plus
//! a short-lived cache of the last computed enumeration shared by every web
//! process. Adapters must apply `mark_online` and `remove_online` as atomic
//! batches: a set member without a backing marker would otherwise persist
//! until the next lazy eviction even when the write half-failed.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ids::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by the presence store adapter.
    pub enum PresenceStoreError {
        /// The key-value store is unreachable.
        Unavailable { message: String } => "presence store is unavailable: {message}",
        /// A stored value could not be decoded.
        Corrupt { message: String } => "presence store returned corrupt data: {message}",
    }
}

/// Port for presence marker and online-set primitives.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Atomically set the user's TTL marker and add them to the online set.
    async fn mark_online(&self, user: UserId, ttl: Duration) -> Result<(), PresenceStoreError>;

    /// Whether the user's TTL marker is currently live.
    async fn is_online(&self, user: UserId) -> Result<bool, PresenceStoreError>;

    /// Atomically delete the user's marker and set membership.
    async fn remove_online(&self, user: UserId) -> Result<(), PresenceStoreError>;

    /// Every member of the online set, live or stale.
    async fn set_members(&self) -> Result<Vec<UserId>, PresenceStoreError>;

    /// Batched liveness check, index-aligned with `users`.
    async fn check_live(&self, users: &[UserId]) -> Result<Vec<bool>, PresenceStoreError>;

    /// Remove stale members from the online set (markers untouched).
    async fn evict(&self, users: &[UserId]) -> Result<(), PresenceStoreError>;

    /// Read the cached enumeration, if one is still live.
    async fn read_cached_ids(&self) -> Result<Option<Vec<UserId>>, PresenceStoreError>;

    /// Replace the cached enumeration with the given TTL.
    async fn write_cached_ids(
        &self,
        users: &[UserId],
        ttl: Duration,
    ) -> Result<(), PresenceStoreError>;
}

/// In-memory presence store with a controllable clock offset.
///
/// TTL expiry is simulated by [`FixturePresenceStore::advance`], letting
/// tests cover marker decay without sleeping.
#[derive(Debug, Default)]
pub struct FixturePresenceStore {
    inner: std::sync::Mutex<FixtureInner>,
}

#[derive(Debug, Default)]
struct FixtureInner {
    markers: std::collections::HashMap<UserId, Duration>,
    set: std::collections::BTreeSet<UserId>,
    cached: Option<(Vec<UserId>, Duration)>,
    now: Duration,
}

impl FixtureInner {
    fn marker_live(&self, user: UserId) -> bool {
        self.markers.get(&user).is_some_and(|expiry| *expiry > self.now)
    }
}

impl FixturePresenceStore {
    /// Create an empty store at clock zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the simulated clock, expiring markers and caches in flight.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.now += by;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FixtureInner>, PresenceStoreError> {
        self.inner
            .lock()
            .map_err(|_| PresenceStoreError::unavailable("fixture mutex poisoned"))
    }
}

#[async_trait]
impl PresenceStore for FixturePresenceStore {
    async fn mark_online(&self, user: UserId, ttl: Duration) -> Result<(), PresenceStoreError> {
        let mut inner = self.lock()?;
        let expiry = inner.now + ttl;
        inner.markers.insert(user, expiry);
        inner.set.insert(user);
        Ok(())
    }

    async fn is_online(&self, user: UserId) -> Result<bool, PresenceStoreError> {
        let inner = self.lock()?;
        Ok(inner.marker_live(user))
    }

    async fn remove_online(&self, user: UserId) -> Result<(), PresenceStoreError> {
        let mut inner = self.lock()?;
        inner.markers.remove(&user);
        inner.set.remove(&user);
        Ok(())
    }

    async fn set_members(&self) -> Result<Vec<UserId>, PresenceStoreError> {
        let inner = self.lock()?;
        Ok(inner.set.iter().copied().collect())
    }

    async fn check_live(&self, users: &[UserId]) -> Result<Vec<bool>, PresenceStoreError> {
        let inner = self.lock()?;
        Ok(users.iter().map(|user| inner.marker_live(*user)).collect())
    }

    async fn evict(&self, users: &[UserId]) -> Result<(), PresenceStoreError> {
        let mut inner = self.lock()?;
        for user in users {
            inner.set.remove(user);
        }
        Ok(())
    }

    async fn read_cached_ids(&self) -> Result<Option<Vec<UserId>>, PresenceStoreError> {
        let inner = self.lock()?;
        Ok(inner
            .cached
            .as_ref()
            .filter(|(_, expiry)| *expiry > inner.now)
            .map(|(ids, _)| ids.clone()))
    }

    async fn write_cached_ids(
        &self,
        users: &[UserId],
        ttl: Duration,
    ) -> Result<(), PresenceStoreError> {
        let mut inner = self.lock()?;
        let expiry = inner.now + ttl;
        inner.cached = Some((users.to_vec(), expiry));
        Ok(())
    }
}
