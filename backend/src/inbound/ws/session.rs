//! Per-connection WebSocket handler.
//!
//! Keeps framing and heartbeats at the edge and defers everything else to
//! the domain: connect marks the user online and joins their broadcast
//! group; a client heartbeat refreshes presence; disconnect leaves the
//! group but deliberately does not remove presence, so a brief network
//! blip cannot flip a user offline before the TTL does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::time;
use tracing::{debug, warn};

use crate::domain::ids::UserId;
use crate::domain::presence::PresenceTracker;
use crate::inbound::ws::messages::ClientMessage;
use crate::outbound::realtime::{HubSubscription, RealtimeHub};

/// Time between server pings (5s in production, shorter in tests).
#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Max idle time before disconnecting the client.
#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

pub(super) async fn handle_ws_session(
    presence: PresenceTracker,
    hub: Arc<RealtimeHub>,
    user: UserId,
    session: Session,
    stream: MessageStream,
) {
    WsSession {
        presence,
        hub,
        user,
    }
    .run(session, stream)
    .await;
}

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Protocol(ProtocolError),
    Network(Closed),
}

struct WsSession {
    presence: PresenceTracker,
    hub: Arc<RealtimeHub>,
    user: UserId,
}

impl WsSession {
    async fn run(&self, mut session: Session, mut stream: MessageStream) {
        let HubSubscription {
            session_id,
            mut receiver,
        } = self.hub.subscribe(self.user).await;

        // The connection itself is an "I'm here" signal.
        self.refresh_presence().await;

        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);

        let error = loop {
            let result = tokio::select! {
                _ = heartbeat.tick() => {
                    self.handle_heartbeat_tick(&mut session, &last_heartbeat).await
                }
                update = receiver.recv() => {
                    self.forward_update(&mut session, update).await
                }
                message = stream.recv() => {
                    self.handle_stream_message(&mut session, &mut last_heartbeat, message).await
                }
            };

            if let Err(error) = result {
                break error;
            }
        };

        // Presence is left to expire via TTL on purpose.
        self.hub.unsubscribe(self.user, session_id).await;
        self.log_shutdown_reason(&error);
        self.close_session_if_needed(session, &error).await;
    }

    async fn refresh_presence(&self) {
        if let Err(error) = self.presence.mark_online(self.user).await {
            warn!(user = %self.user, error = %error, "presence refresh failed");
        }
    }

    async fn handle_heartbeat_tick(
        &self,
        session: &mut Session,
        last_heartbeat: &Instant,
    ) -> Result<(), SessionError> {
        if Instant::now().duration_since(*last_heartbeat) > CLIENT_TIMEOUT {
            return Err(SessionError::HeartbeatTimeout);
        }

        session.ping(b"").await.map_err(SessionError::Network)
    }

    async fn forward_update(
        &self,
        session: &mut Session,
        update: Option<crate::domain::ports::UnreadCountUpdate>,
    ) -> Result<(), SessionError> {
        let Some(update) = update else {
            // The hub dropped us; treat it like a closed stream.
            return Err(SessionError::StreamClosed);
        };
        match serde_json::to_string(&update) {
            Ok(body) => session.text(body).await.map_err(SessionError::Network),
            Err(error) => {
                warn!(error = %error, "unread-count payload failed to serialise");
                Ok(())
            }
        }
    }

    async fn handle_stream_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), SessionError> {
        let Some(message) = message else {
            return Err(SessionError::StreamClosed);
        };

        match message {
            Ok(message) => self.handle_message(session, last_heartbeat, message).await,
            Err(error) => Err(SessionError::Protocol(error)),
        }
    }

    async fn handle_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Message,
    ) -> Result<(), SessionError> {
        match message {
            Message::Ping(payload) => {
                *last_heartbeat = Instant::now();
                session
                    .pong(&payload)
                    .await
                    .map_err(SessionError::Network)?;
                Ok(())
            }
            Message::Text(text) => {
                *last_heartbeat = Instant::now();
                self.handle_text_message(text.as_ref()).await;
                Ok(())
            }
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                *last_heartbeat = Instant::now();
                Ok(())
            }
            Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
        }
    }

    async fn handle_text_message(&self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Heartbeat) => self.refresh_presence().await,
            Err(error) => {
                // Unknown payloads are dropped; the socket stays open.
                debug!(user = %self.user, error = %error, "ignoring malformed client payload");
            }
        }
    }

    fn log_shutdown_reason(&self, error: &SessionError) {
        match error {
            SessionError::HeartbeatTimeout => {
                warn!(user = %self.user, "WebSocket heartbeat timeout; closing connection");
            }
            SessionError::Protocol(error) => {
                warn!(user = %self.user, error = %error, "WebSocket protocol error");
            }
            SessionError::Network(error) => {
                warn!(user = %self.user, error = %error, "WebSocket send failed; closing connection");
            }
            SessionError::ClientClosed(_) | SessionError::StreamClosed => {}
        }
    }

    async fn close_session_if_needed(&self, session: Session, error: &SessionError) {
        let reason = match error {
            SessionError::HeartbeatTimeout => Some(CloseReason {
                code: CloseCode::Normal,
                description: Some("heartbeat timeout".to_owned()),
            }),
            SessionError::Protocol(_) => Some(CloseReason {
                code: CloseCode::Protocol,
                description: Some("protocol error".to_owned()),
            }),
            SessionError::ClientClosed(reason) => reason.clone(),
            SessionError::StreamClosed | SessionError::Network(_) => return,
        };
        if let Err(error) = session.close(reason).await {
            warn!(error = %error, "failed to close WebSocket session");
        }
    }
}
