//! Keyed lease used to collapse equivalent pending tasks.
//!
//! The guard is a broker-agnostic marker keyed by `(task_name, recipient)`.
//! Acquisition happens at submission time; the worker releases the lease
//! when the task completes. The lease carries a bounded TTL so a hung task
//! cannot starve a recipient's pushes forever (see DESIGN.md for the
//! divergence this represents).

use std::time::Duration;

use async_trait::async_trait;

use super::define_port_error;

/// Bound on how long a lease may shadow subsequent submissions.
pub const DEDUP_LEASE_TTL: Duration = Duration::from_secs(10);

define_port_error! {
    /// Errors surfaced by the dedup guard adapter.
    pub enum DedupGuardError {
        /// The backing store is unreachable.
        Unavailable { message: String } => "dedup store is unavailable: {message}",
    }
}

/// Port for the keyed submission lease.
///
/// A failing guard must fall open: callers treat `Err` as "allow the
/// submission" so a dedup outage can only produce extra pushes, never
/// silently lost ones.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DedupGuard: Send + Sync {
    /// Try to take the lease for `key`. Returns `false` when an equivalent
    /// submission already holds it.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, DedupGuardError>;

    /// Release the lease for `key`. Releasing an absent lease is not an
    /// error.
    async fn release(&self, key: &str) -> Result<(), DedupGuardError>;
}

/// In-memory guard for unit tests.
#[derive(Debug, Default)]
pub struct FixtureDedupGuard {
    held: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl FixtureDedupGuard {
    /// Create a guard with no leases held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is currently leased.
    pub fn holds(&self, key: &str) -> bool {
        self.held.lock().map(|held| held.contains(key)).unwrap_or(false)
    }
}

#[async_trait]
impl DedupGuard for FixtureDedupGuard {
    async fn try_acquire(&self, key: &str, _ttl: Duration) -> Result<bool, DedupGuardError> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| DedupGuardError::unavailable("lease mutex poisoned"))?;
        Ok(held.insert(key.to_owned()))
    }

    async fn release(&self, key: &str) -> Result<(), DedupGuardError> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| DedupGuardError::unavailable("lease mutex poisoned"))?;
        held.remove(key);
        Ok(())
    }
}
