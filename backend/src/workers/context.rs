//! Dependency bundle for task handlers.

use std::sync::Arc;

use crate::domain::counters::CounterReconciler;
use crate::domain::outbox::TaskSubmitter;
use crate::domain::ports::{
    ContentRepository, NotificationRepository, ObjectStorage, RealtimePublisher, UserRepository,
};
use crate::domain::presence::PresenceTracker;

/// Everything a task handler may need, injected as ports.
///
/// Handlers receive this through the worker's data extractor; tests build
/// it from fixtures and mocks.
#[derive(Clone)]
pub struct WorkerContext {
    pub notifications: Arc<dyn NotificationRepository>,
    pub content: Arc<dyn ContentRepository>,
    pub users: Arc<dyn UserRepository>,
    pub presence: PresenceTracker,
    pub storage: Arc<dyn ObjectStorage>,
    pub realtime: Arc<dyn RealtimePublisher>,
    pub submitter: TaskSubmitter,
    pub reconciler: CounterReconciler,
    pub http: reqwest::Client,
}

impl WorkerContext {
    /// Assemble a context from explicit port implementations.
    #[expect(clippy::too_many_arguments, reason = "pure wiring constructor")]
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        content: Arc<dyn ContentRepository>,
        users: Arc<dyn UserRepository>,
        presence: PresenceTracker,
        storage: Arc<dyn ObjectStorage>,
        realtime: Arc<dyn RealtimePublisher>,
        submitter: TaskSubmitter,
        http: reqwest::Client,
    ) -> Self {
        let reconciler = CounterReconciler::new(content.clone(), users.clone());
        Self {
            notifications,
            content,
            users,
            presence,
            storage,
            realtime,
            submitter,
            reconciler,
            http,
        }
    }
}
