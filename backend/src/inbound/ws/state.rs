//! Shared WebSocket adapter state.

use std::sync::Arc;

use crate::domain::presence::PresenceTracker;
use crate::outbound::realtime::RealtimeHub;

/// Dependency bundle for the WebSocket entry point and sessions.
#[derive(Clone)]
pub struct WsState {
    pub presence: PresenceTracker,
    pub hub: Arc<RealtimeHub>,
}

impl WsState {
    /// Construct state from explicit dependencies.
    pub fn new(presence: PresenceTracker, hub: Arc<RealtimeHub>) -> Self {
        Self { presence, hub }
    }
}
