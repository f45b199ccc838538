//! Per-process registry of live WebSocket sessions.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ids::UserId;
use crate::domain::ports::UnreadCountUpdate;

/// One session's membership in its user's broadcast group.
///
/// Dropping the subscription does not unsubscribe; sessions call
/// [`RealtimeHub::unsubscribe`] on disconnect so the hub can log the
/// departure explicitly.
pub struct HubSubscription {
    /// Identifier for this session within the hub.
    pub session_id: Uuid,
    /// Receiving half the WebSocket session forwards to the client.
    pub receiver: mpsc::UnboundedReceiver<UnreadCountUpdate>,
}

/// Fan-out registry mapping users to their open sessions.
///
/// A user with several open tabs has several sessions in the same group;
/// every dispatch reaches all of them.
#[derive(Default)]
pub struct RealtimeHub {
    groups: RwLock<HashMap<UserId, HashMap<Uuid, mpsc::UnboundedSender<UnreadCountUpdate>>>>,
}

impl RealtimeHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `user`'s broadcast group with a fresh session.
    pub async fn subscribe(&self, user: UserId) -> HubSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();
        self.groups
            .write()
            .await
            .entry(user)
            .or_default()
            .insert(session_id, sender);
        debug!(%user, %session_id, "session joined broadcast group");
        HubSubscription {
            session_id,
            receiver,
        }
    }

    /// Leave `user`'s broadcast group. Absent sessions are ignored.
    pub async fn unsubscribe(&self, user: UserId, session_id: Uuid) {
        let mut groups = self.groups.write().await;
        if let Some(group) = groups.get_mut(&user) {
            group.remove(&session_id);
            if group.is_empty() {
                groups.remove(&user);
            }
        }
        debug!(%user, %session_id, "session left broadcast group");
    }

    /// Deliver `update` to every session of `user`; returns how many
    /// sessions received it.
    pub async fn dispatch(&self, user: UserId, update: UnreadCountUpdate) -> usize {
        let groups = self.groups.read().await;
        let Some(group) = groups.get(&user) else {
            return 0;
        };
        let mut delivered = 0;
        for sender in group.values() {
            // A closed receiver just means the session is going away; it
            // will unsubscribe itself shortly.
            if sender.send(update).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of sessions currently registered for `user`.
    pub async fn session_count(&self, user: UserId) -> usize {
        self.groups
            .read()
            .await
            .get(&user)
            .map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(count: i64) -> UnreadCountUpdate {
        UnreadCountUpdate {
            unread_notifications_count: count,
            update_list: true,
        }
    }

    #[tokio::test]
    async fn dispatch_reaches_every_open_tab() {
        let hub = RealtimeHub::new();
        let user = UserId::random();
        let mut first = hub.subscribe(user).await;
        let mut second = hub.subscribe(user).await;

        let delivered = hub.dispatch(user, update(2)).await;

        assert_eq!(delivered, 2);
        assert_eq!(
            first.receiver.recv().await.map(|u| u.unread_notifications_count),
            Some(2)
        );
        assert_eq!(
            second.receiver.recv().await.map(|u| u.unread_notifications_count),
            Some(2)
        );
    }

    #[tokio::test]
    async fn dispatch_to_an_offline_user_reaches_nobody() {
        let hub = RealtimeHub::new();
        assert_eq!(hub.dispatch(UserId::random(), update(1)).await, 0);
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_the_departing_session() {
        let hub = RealtimeHub::new();
        let user = UserId::random();
        let first = hub.subscribe(user).await;
        let _second = hub.subscribe(user).await;

        hub.unsubscribe(user, first.session_id).await;

        assert_eq!(hub.session_count(user).await, 1);
        assert_eq!(hub.dispatch(user, update(1)).await, 1);
    }
}
