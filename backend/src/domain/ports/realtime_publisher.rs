//! Port for pushing unread-count updates to a user's live sessions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ids::UserId;

use super::define_port_error;

/// Server-to-client payload broadcast to every open session of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountUpdate {
    /// Current number of unread notifications.
    pub unread_notifications_count: i64,
    /// Whether the client should also refresh its notification list.
    pub update_list: bool,
}

define_port_error! {
    /// Errors surfaced by the realtime transport adapter.
    pub enum RealtimePublishError {
        /// The broadcast transport is unreachable.
        Unavailable { message: String } => "realtime transport is unavailable: {message}",
        /// The payload could not be encoded for the wire.
        Encoding { message: String } => "realtime payload failed to encode: {message}",
    }
}

/// Port for fanning one update out to all of a recipient's connections.
///
/// Publishing to a user with no open sessions succeeds and delivers to
/// nobody; presence is tracked separately.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    /// Broadcast `update` to every session subscribed for `recipient`.
    async fn publish(
        &self,
        recipient: UserId,
        update: UnreadCountUpdate,
    ) -> Result<(), RealtimePublishError>;
}

/// Capture publisher for unit tests.
#[derive(Debug, Default)]
pub struct FixtureRealtimePublisher {
    published: std::sync::Mutex<Vec<(UserId, UnreadCountUpdate)>>,
}

impl FixtureRealtimePublisher {
    /// Create an empty capture publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn published(&self) -> Vec<(UserId, UnreadCountUpdate)> {
        self.published.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RealtimePublisher for FixtureRealtimePublisher {
    async fn publish(
        &self,
        recipient: UserId,
        update: UnreadCountUpdate,
    ) -> Result<(), RealtimePublishError> {
        self.published
            .lock()
            .map_err(|_| RealtimePublishError::unavailable("capture mutex poisoned"))?
            .push((recipient, update));
        Ok(())
    }
}
