//! Transaction-scoped outbox for post-commit task dispatch.
//!
//! A unit of work owns one [`Outbox`] and registers task messages into it
//! while mutating domain rows. Nothing reaches the queue until the
//! outermost transaction commits, so background work never observes a
//! half-committed transaction; a rolled-back transaction discards its
//! registrations. Nested scopes mirror savepoints: an inner rollback
//! discards exactly the registrations made inside it, an inner commit
//! defers them to the outermost commit.
//!
//! Submission failures are logged per message and never retried here; a
//! lost trigger is healed by the periodic reconciliation jobs rather than
//! by blocking request completion on broker availability.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::ports::{DedupGuard, TaskQueue, DEDUP_LEASE_TTL};
use crate::domain::tasks::TaskMessage;

/// Hands messages to the queue, collapsing duplicates behind their dedup
/// key.
///
/// The dedup check falls open: when the guard itself fails, the message is
/// submitted anyway. An outage of the dedup store may duplicate pushes but
/// can never silently lose one.
#[derive(Clone)]
pub struct TaskSubmitter {
    queue: Arc<dyn TaskQueue>,
    dedup: Arc<dyn DedupGuard>,
}

impl TaskSubmitter {
    /// Build a submitter over the given ports.
    pub fn new(queue: Arc<dyn TaskQueue>, dedup: Arc<dyn DedupGuard>) -> Self {
        Self { queue, dedup }
    }

    /// Submit one message; duplicates and failures are absorbed here.
    ///
    /// Returns `true` when the message was handed to the queue, `false`
    /// when it was collapsed into an already-pending equivalent.
    pub async fn submit(&self, message: &TaskMessage) -> bool {
        if let Some(key) = message.dedup_key() {
            match self.dedup.try_acquire(&key, DEDUP_LEASE_TTL).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(task = message.name(), key, "duplicate task collapsed");
                    return false;
                }
                Err(error) => {
                    // Fall open: better a duplicate push than a lost one.
                    warn!(task = message.name(), error = %error, "dedup check failed; submitting anyway");
                }
            }
        }

        if let Err(error) = self.queue.enqueue(message).await {
            warn!(task = message.name(), error = %error, "task enqueue failed; trigger lost until reconciliation");
            if let Some(key) = message.dedup_key() {
                // The push never made it onto the queue, so stop the lease
                // from shadowing the next attempt.
                if let Err(release_error) = self.dedup.release(&key).await {
                    debug!(key, error = %release_error, "failed to release dedup lease");
                }
            }
            return false;
        }
        true
    }

    /// Release the dedup lease once a deduplicated task finished running.
    pub async fn finish(&self, message: &TaskMessage) {
        if let Some(key) = message.dedup_key() {
            if let Err(error) = self.dedup.release(&key).await {
                debug!(key, error = %error, "failed to release dedup lease");
            }
        }
    }
}

/// Pending task messages attached to one unit of work.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<TaskMessage>,
    savepoints: Vec<usize>,
}

impl Outbox {
    /// Create an empty outbox for a fresh unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message to fire after the outermost commit.
    pub fn register(&mut self, message: TaskMessage) {
        self.pending.push(message);
    }

    /// Number of registered messages.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Open a nested scope; pairs with [`Outbox::commit_nested`] or
    /// [`Outbox::rollback_nested`].
    pub fn begin_nested(&mut self) {
        self.savepoints.push(self.pending.len());
    }

    /// Close the innermost scope, keeping its registrations deferred until
    /// the outermost commit.
    pub fn commit_nested(&mut self) {
        self.savepoints.pop();
    }

    /// Discard everything registered since the innermost scope opened.
    pub fn rollback_nested(&mut self) {
        if let Some(mark) = self.savepoints.pop() {
            self.pending.truncate(mark);
        }
    }

    /// Discard every registration; used when the transaction aborts.
    pub fn rollback(mut self) {
        self.pending.clear();
    }

    /// Flush registrations to the queue in registration order.
    ///
    /// Call strictly after the enclosing transaction has durably
    /// committed. Individual submission failures are logged inside the
    /// submitter and do not stop the remaining messages.
    pub async fn commit(self, submitter: &TaskSubmitter) {
        for message in self.pending {
            submitter.submit(&message).await;
        }
    }
}
