//! Realtime fan-out transport.
//!
//! Workers publish unread-count updates to the Redis channel
//! `user:<uuid>`; each web process runs one pattern-subscriber bridge that
//! forwards matching payloads to its local [`RealtimeHub`], which fans them
//! out to every WebSocket session registered for that user. The worker
//! tier and the web tier share no memory; Redis pub/sub is the only path
//! between them.

mod hub;
mod publisher;

pub use hub::{HubSubscription, RealtimeHub};
pub use publisher::RedisRealtimePublisher;

use std::sync::Arc;
use std::time::Duration;

use bb8_redis::redis;
use futures_util::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::ids::UserId;
use crate::domain::ports::UnreadCountUpdate;

/// Channel name for one user's broadcast group.
pub fn user_channel(user: UserId) -> String {
    format!("user:{user}")
}

const CHANNEL_PATTERN: &str = "user:*";
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Run the subscriber bridge until the process exits.
///
/// Reconnects with a short delay whenever the subscription drops; missed
/// pushes during the gap are healed the next time anything touches the
/// recipient's unread count.
pub async fn run_pubsub_bridge(client: redis::Client, hub: Arc<RealtimeHub>) {
    loop {
        match subscribe_and_forward(&client, &hub).await {
            Ok(()) => debug!("pub/sub stream ended; resubscribing"),
            Err(error) => warn!(error = %error, "pub/sub bridge failed; resubscribing"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn subscribe_and_forward(
    client: &redis::Client,
    hub: &RealtimeHub,
) -> Result<(), redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(CHANNEL_PATTERN).await?;

    let mut stream = pubsub.on_message();
    while let Some(message) = stream.next().await {
        let channel = message.get_channel_name().to_owned();
        let Some(user) = user_from_channel(&channel) else {
            debug!(channel, "ignoring message on unrecognised channel");
            continue;
        };
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(error) => {
                warn!(channel, error = %error, "undecodable pub/sub payload");
                continue;
            }
        };
        match serde_json::from_str::<UnreadCountUpdate>(&payload) {
            Ok(update) => {
                hub.dispatch(user, update).await;
            }
            Err(error) => warn!(channel, error = %error, "malformed unread-count payload"),
        }
    }
    Ok(())
}

fn user_from_channel(channel: &str) -> Option<UserId> {
    let raw = channel.strip_prefix("user:")?;
    Uuid::parse_str(raw).ok().map(UserId::from_uuid)
}
