//! Asynchronous derived-state consistency layer for a forum backend.
//!
//! Keeps cached and derived data — unread-notification counts, online
//! presence, per-user activity counters, avatar file sets — correct while
//! it is computed outside the request transaction by queue workers, under
//! concurrent writers, with at-least-once delivery. The CRUD surface of
//! the forum is out of scope and talks to this crate through the ports in
//! [`domain::ports`] and the event handlers in [`domain::events`].

pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod server;
pub mod workers;
