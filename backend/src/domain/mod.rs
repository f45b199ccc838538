//! Domain entities, services, and the hexagonal port boundary.
//!
//! Everything here is infrastructure-free: adapters in `crate::outbound`
//! implement the traits under [`ports`], and the inbound adapters plus the
//! worker handlers drive the services. Invariants and serialisation
//! contracts are documented on each type.

pub mod avatars;
pub mod counters;
pub mod events;
pub mod ids;
pub mod notification;
pub mod notification_service;
pub mod outbox;
pub mod ports;
pub mod presence;
pub mod tasks;

pub use self::counters::{CounterField, CounterReconciler, CounterSnapshot};
pub use self::events::ContentEvents;
pub use self::ids::{CommentId, ContentKind, ContentRef, LikeId, NotificationId, PostId, UserId};
pub use self::notification::{Notification, NotificationKind};
pub use self::notification_service::NotificationService;
pub use self::outbox::{Outbox, TaskSubmitter};
pub use self::presence::PresenceTracker;
pub use self::tasks::TaskMessage;
