//! Cache events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: every `RecoverableCache` (and therefore the connection,
//!   session and channel caches), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the [`Monitor`](crate::Monitor) listener, or any receiver from
//!   [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
