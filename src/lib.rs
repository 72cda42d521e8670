//! # amqp-recovery
//!
//! **amqp-recovery** keeps the connection, sessions and request-response
//! channels of an AMQP 1.0 client alive. Each resource sits behind a cache that
//! creates it on demand, waits until the peer acknowledges it, retries
//! transient failures with backoff, and transparently replaces it once it dies.
//!
//! The protocol engine itself is not part of this crate: resources are anything
//! implementing [`Recoverable`] (a [`LifecycleSignal`] plus `close()`), created
//! by a synchronous [`ResourceFactory`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  caller ─┐  caller ─┐  caller ─┐
//!          ▼          ▼          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  RecoverableCache<T>                                        │
//! │  - entry: { instance, signal, generation }   (fast path)    │
//! │  - inflight: Shared<cycle outcome>           (single-flight)│
//! │  - disposed / owner_disposed flags                          │
//! └──────┬───────────────────────────────────────┬──────────────┘
//!        │ no usable entry                       │ entry cached
//!        ▼                                       ▼
//! ┌──────────────────────────────┐      ┌──────────────────────────┐
//! │ population cycle (one task)  │      │ watcher (one per entry)  │
//! │  factory.create()            │      │  signal.terminated()     │
//! │  wait Active ≤ try_timeout   │      │  generation matches?     │
//! │  RetryPolicy → delay | stop  │      │   └─► evict + close      │
//! └──────────────┬───────────────┘      └────────────┬─────────────┘
//!                │ publishes                         │ publishes
//!                ▼                                   ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Bus (broadcast channel)                  │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               ▼
//!                    Monitor ──► SubscriberSet ──► LogWriter, custom
//! ```
//!
//! ### Population cycle
//! ```text
//! attempt = 0
//! loop {
//!   ├─► instance = factory.create()        ── Err ─► fail cycle (never retried)
//!   ├─► wait for Active (try_timeout, cancellable)
//!   │       ├─ Active                      ─► cache entry, spawn watcher, done
//!   │       └─ Timeout / Closed / Errored  ─► close instance
//!   │              └─ policy.calculate_retry_delay(err, min(attempt, max_retries))
//!   │                    ├─ None           ─► fail cycle with err
//!   │                    └─ Some(delay)    ─► sleep (cancellable), attempt += 1
//! }
//! ```
//!
//! ## Features
//! | Area               | Description                                                   | Key types / traits                                 |
//! |--------------------|---------------------------------------------------------------|----------------------------------------------------|
//! | **Caches**         | Single-flight, self-healing resource caches.                  | [`RecoverableCache`], [`KeyedRecoverableCache`]    |
//! | **Resources**      | Connection, session and request-response channel caches.     | [`ConnectionCache`], [`SessionCache`], [`ChannelCache`] |
//! | **Lifecycle**      | Observable endpoint states and their composite.               | [`LifecycleSignal`], [`LifecycleState`]            |
//! | **Policies**       | Retry classification and backoff.                             | [`RetryPolicy`], [`AmqpRetryPolicy`], [`BackoffPolicy`] |
//! | **Subscriber API** | Hook into cache events (logging, metrics).                    | [`Subscribe`], [`Monitor`]                         |
//! | **Errors**         | Typed, shareable errors with AMQP conditions.                 | [`AmqpError`], [`ErrorCondition`]                  |
//! | **Configuration**  | Retry options and bus capacity.                               | [`RecoveryConfig`]                                 |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], writing events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use amqp_recovery::{
//!     AmqpError, FactoryFn, LifecycleHandle, LifecycleSignal, Monitor, Recoverable,
//!     RecoveryConfig, ResourceContext, Subscribe, lifecycle,
//! };
//!
//! struct Connection {
//!     handle: LifecycleHandle,
//!     states: LifecycleSignal,
//! }
//!
//! impl Recoverable for Connection {
//!     fn endpoint_states(&self) -> LifecycleSignal { self.states.clone() }
//!     fn close(&self) { self.handle.complete(); }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Arc<AmqpError>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(amqp_recovery::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let monitor = Monitor::new(RecoveryConfig::default(), subs);
//!     let connections = monitor.connection_cache(
//!         ResourceContext::new("connection", "ns.example.net"),
//!         FactoryFn::new(|| {
//!             let (handle, states) = lifecycle::channel();
//!             handle.activate(); // the engine reports the open frame
//!             Ok::<_, AmqpError>(Arc::new(Connection { handle, states }))
//!         }),
//!     );
//!
//!     let conn = connections.get().await?;
//!     assert!(conn.endpoint_states().current().is_active());
//!
//!     connections.dispose();
//!     monitor.shutdown().await;
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod error;
mod events;
pub mod lifecycle;
mod monitor;
mod policies;
mod resources;
mod subscribers;

// ---- Public re-exports ----

pub use cache::{
    CacheBuilder, FactoryFn, KeyedRecoverableCache, KeyedResourceFactory, Recoverable,
    RecoverableCache, ResourceFactory,
};
pub use config::RecoveryConfig;
pub use error::{AmqpError, ConfigError, ErrorCondition, SharedError};
pub use events::{Bus, Event, EventKind};
pub use lifecycle::{LifecycleHandle, LifecycleSignal, LifecycleState};
pub use monitor::Monitor;
pub use policies::{
    AmqpRetryPolicy, BackoffPolicy, JitterPolicy, RetryMode, RetryOptions, RetryPolicy,
    SERVER_BUSY_BASE_DELAY,
};
pub use resources::{
    ChannelCache, ConnectionCache, RequestResponseChannel, ResourceContext, SessionCache,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Built-in `tracing` subscriber.
// Enabled by default; disable with `default-features = false`.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
