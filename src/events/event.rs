//! # Events emitted by the recovery caches.
//!
//! The [`EventKind`] enum classifies events into:
//! - **Cycle events**: one population cycle (attempts, timeouts, backoff, outcome)
//! - **Entry events**: what happens to a cached resource after activation
//! - **Cache events**: owner/disposal transitions
//! - **Subscriber events**: delivery problems of the fan-out itself
//!
//! ## Ordering guarantees
//! Every event carries a globally unique, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use amqp_recovery::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_resource("connection 'ns.example.net'")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_millis(1600))
//!     .with_reason("i/o error: connection reset");
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.delay_ms, Some(1600));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of cache events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Cycle events ===
    /// A population cycle started.
    ///
    /// Sets: `resource`, `generation`
    CycleStarted,

    /// The factory is about to be invoked.
    ///
    /// Sets: `resource`, `generation`, `attempt` (0-based within the cycle)
    AttemptStarting,

    /// The candidate did not become active within the try-timeout.
    ///
    /// Sets: `resource`, `attempt`, `timeout_ms`
    ActivationTimeout,

    /// An attempt failed (timeout, early close or endpoint error).
    ///
    /// Sets: `resource`, `attempt`, `reason`
    AttemptFailed,

    /// The failure was retriable; the next attempt is scheduled.
    ///
    /// Sets: `resource`, `attempt` (failed attempt), `delay_ms`, `reason`
    BackoffScheduled,

    /// A candidate became active and was cached.
    ///
    /// Sets: `resource`, `generation`, `attempt`
    ResourceActive,

    /// The cycle ended without a resource.
    ///
    /// Sets: `resource`, `generation`, `reason`
    CycleFailed,

    // === Entry events ===
    /// The cached resource reached a terminal state.
    ///
    /// Sets: `resource`, `generation`, `reason` (terminal state)
    ResourceTerminated,

    /// The cached resource was removed; the next `get` repopulates.
    ///
    /// Sets: `resource`, `generation`, `reason` (`terminated` or `explicit`)
    ResourceEvicted,

    /// A terminated resource stays cached because its owner is shutting down.
    ///
    /// Sets: `resource`, `generation`
    EvictionSuppressed,

    // === Cache events ===
    /// The owner marked itself as disposing.
    ///
    /// Sets: `resource`
    OwnerDisposed,

    /// The cache was disposed.
    ///
    /// Sets: `resource`
    CacheDisposed,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `resource` (subscriber name), `reason` (panic message)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `resource` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Cache event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Resource (or subscriber) the event is about.
    pub resource: Option<Arc<str>>,
    /// Attempt index within the cycle (0-based).
    pub attempt: Option<u32>,
    /// Cycle/entry generation.
    pub generation: Option<u64>,
    /// Backoff delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Try-timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (error, terminal state, overflow cause).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            resource: None,
            attempt: None,
            generation: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    /// Attaches the resource name.
    #[inline]
    pub fn with_resource(mut self, resource: impl Into<Arc<str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attaches an attempt index.
    #[inline]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches a generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a try-timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_resource(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_resource(subscriber)
            .with_reason(info)
    }
}

fn clamp_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
