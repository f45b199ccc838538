//! Inbound adapters: HTTP endpoints and the WebSocket channel.

pub mod http;
pub mod ws;
