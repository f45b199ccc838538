//! Wire payloads for the notification WebSocket.

use serde::{Deserialize, Serialize};

/// Messages a client may send over the socket.
///
/// Only the heartbeat exists today; it has no reply, its sole effect is a
/// presence refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Heartbeat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn heartbeat_parses_from_the_documented_envelope() {
        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type":"heartbeat"}"#).expect("heartbeat parses");
        assert_eq!(parsed, ClientMessage::Heartbeat);
    }

    #[rstest]
    fn unknown_types_are_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}
