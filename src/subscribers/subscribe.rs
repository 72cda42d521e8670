//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for reacting to cache events: logging,
//! metrics, alerting on a connection that keeps failing to come back.
//!
//! Each subscriber gets its own bounded queue and worker task inside the
//! [`SubscriberSet`](crate::SubscriberSet), so a slow or panicking subscriber
//! never delays a cache or another subscriber.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use async_trait::async_trait;
//! use amqp_recovery::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct Reconnects(AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for Reconnects {
//!     async fn on_event(&self, _ev: &Event) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!
//!     fn accepts(&self, kind: EventKind) -> bool {
//!         kind == EventKind::ResourceActive
//!     }
//!
//!     fn name(&self) -> &'static str { "reconnects" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Receives cache events on a dedicated worker.
///
/// ### Implementation requirements
/// - Do not block the executor; use async I/O.
/// - Handle errors internally. Panics are caught and reported as
///   `SubscriberPanicked`, but the event is lost for this subscriber.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. Events arrive in publication order.
    async fn on_event(&self, event: &Event);

    /// Whether events of `kind` should be queued for this subscriber at all.
    ///
    /// Filtering happens before queueing, so rejected kinds never count
    /// against [`Subscribe::queue_capacity`]. Default: everything.
    fn accepts(&self, _kind: EventKind) -> bool {
        true
    }

    /// Name used in overflow/panic events. Default: the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue capacity; clamped to at least 1. Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
