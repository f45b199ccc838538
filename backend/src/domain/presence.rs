//! Best-effort "online now" tracking with lazy eviction.
//!
//! The TTL marker is the single source of truth for liveness; the parallel
//! online set only exists because TTL keys cannot be enumerated
//! efficiently. Every read of the set re-checks the markers and drops
//! stale members as a side effect, so no sweep process is needed. Callers
//! that enumerate on every request go through the short shared cache to
//! bound store round-trips; a couple of seconds of staleness is acceptable
//! for presence indicators.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::ids::UserId;
use crate::domain::ports::{PresenceStore, PresenceStoreError};

/// How long a heartbeat keeps a user online.
pub const ONLINE_TTL: Duration = Duration::from_secs(120);

/// Lifetime of the shared enumeration cache.
pub const ONLINE_CACHE_TTL: Duration = Duration::from_secs(2);

/// Presence service over the key-value store port.
#[derive(Clone)]
pub struct PresenceTracker {
    store: Arc<dyn PresenceStore>,
}

impl PresenceTracker {
    /// Build a tracker over the given store.
    pub fn new(store: Arc<dyn PresenceStore>) -> Self {
        Self { store }
    }

    /// Mark the user online for [`ONLINE_TTL`] from now.
    pub async fn mark_online(&self, user: UserId) -> Result<(), PresenceStoreError> {
        self.store.mark_online(user, ONLINE_TTL).await
    }

    /// O(1) liveness check against the TTL marker only.
    pub async fn is_online(&self, user: UserId) -> Result<bool, PresenceStoreError> {
        self.store.is_online(user).await
    }

    /// Explicit removal on logout.
    pub async fn remove_online(&self, user: UserId) -> Result<(), PresenceStoreError> {
        self.store.remove_online(user).await
    }

    /// All users whose marker is still live.
    ///
    /// Set members whose marker has expired are evicted as a side effect
    /// before the live subset is returned.
    pub async fn list_online_ids(&self) -> Result<Vec<UserId>, PresenceStoreError> {
        let members = self.store.set_members().await?;
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let live_flags = self.store.check_live(&members).await?;
        let mut live = Vec::with_capacity(members.len());
        let mut stale = Vec::new();
        for (user, is_live) in members.into_iter().zip(live_flags) {
            if is_live {
                live.push(user);
            } else {
                stale.push(user);
            }
        }

        if !stale.is_empty() {
            debug!(evicted = stale.len(), "evicting stale online-set members");
            self.store.evict(&stale).await?;
        }
        Ok(live)
    }

    /// Cached variant of [`PresenceTracker::list_online_ids`] for hot read
    /// paths.
    pub async fn cached_online_ids(&self) -> Result<Vec<UserId>, PresenceStoreError> {
        if let Some(cached) = self.store.read_cached_ids().await? {
            return Ok(cached);
        }

        let live = self.list_online_ids().await?;
        self.store.write_cached_ids(&live, ONLINE_CACHE_TTL).await?;
        Ok(live)
    }
}
