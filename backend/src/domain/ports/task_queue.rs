//! Domain port describing task-queue dispatch semantics.

use async_trait::async_trait;

use crate::domain::tasks::TaskMessage;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by the queue adapter.
    pub enum TaskDispatchError {
        /// Queue infrastructure is unavailable.
        Unavailable { message: String } => "task queue is unavailable: {message}",
        /// The message could not be acknowledged or persisted.
        Rejected { message: String } => "task message was rejected: {message}",
    }
}

/// Port for handing messages to the distributed task queue.
///
/// Delivery is at-least-once once `enqueue` returns `Ok`; a failed enqueue
/// is a lost trigger, healed later by the reconciliation jobs. Callers must
/// not block request completion on a failed enqueue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Submit one message for background execution.
    async fn enqueue(&self, message: &TaskMessage) -> Result<(), TaskDispatchError>;
}

/// In-memory queue capturing submissions for inspection.
///
/// Used by unit tests that assert on what was enqueued without standing up
/// a broker.
#[derive(Debug, Default)]
pub struct FixtureTaskQueue {
    submitted: std::sync::Mutex<Vec<TaskMessage>>,
}

impl FixtureTaskQueue {
    /// Create an empty capture queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything enqueued so far, in order.
    pub fn submitted(&self) -> Vec<TaskMessage> {
        self.submitted.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.clear();
        }
    }
}

#[async_trait]
impl TaskQueue for FixtureTaskQueue {
    async fn enqueue(&self, message: &TaskMessage) -> Result<(), TaskDispatchError> {
        self.submitted
            .lock()
            .map_err(|_| TaskDispatchError::rejected("capture mutex poisoned"))?
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tasks::TaskMessage;

    #[tokio::test]
    async fn fixture_queue_captures_in_order() {
        let queue = FixtureTaskQueue::new();
        queue
            .enqueue(&TaskMessage::SyncPresenceToStore)
            .await
            .expect("first enqueue succeeds");
        queue
            .enqueue(&TaskMessage::ReconcileUserCounters { batch_size: 10 })
            .await
            .expect("second enqueue succeeds");

        let submitted = queue.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0], TaskMessage::SyncPresenceToStore);
    }
}
