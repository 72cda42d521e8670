//! # LogWriter: cache events as `tracing` records.
//!
//! Progress goes to `debug`, failures and backoff to `warn`, state changes an
//! operator cares about (activation, eviction, disposal) to `info`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG amqp_recovery: cycle started resource="connection (ns.example.net)" generation=1
//! WARN  amqp_recovery: attempt failed resource="connection (ns.example.net)" attempt=0 reason="i/o error: connection refused"
//! WARN  amqp_recovery: backoff scheduled resource="connection (ns.example.net)" attempt=0 delay_ms=800
//! INFO  amqp_recovery: resource active resource="connection (ns.example.net)" generation=1 attempt=1
//! INFO  amqp_recovery: resource evicted resource="session 'cbs' (ns.example.net)" generation=1 reason="terminated"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "amqp_recovery";

/// Subscriber writing every event through `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let resource = e.resource.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::CycleStarted => {
                debug!(target: TARGET, resource, generation = e.generation, "cycle started");
            }
            EventKind::AttemptStarting => {
                debug!(target: TARGET, resource, attempt = e.attempt, "attempt starting");
            }
            EventKind::ActivationTimeout => {
                warn!(target: TARGET, resource, attempt = e.attempt, timeout_ms = e.timeout_ms, "activation timed out");
            }
            EventKind::AttemptFailed => {
                warn!(target: TARGET, resource, attempt = e.attempt, reason, "attempt failed");
            }
            EventKind::BackoffScheduled => {
                warn!(target: TARGET, resource, attempt = e.attempt, delay_ms = e.delay_ms, "backoff scheduled");
            }
            EventKind::ResourceActive => {
                info!(target: TARGET, resource, generation = e.generation, attempt = e.attempt, "resource active");
            }
            EventKind::CycleFailed => {
                warn!(target: TARGET, resource, generation = e.generation, reason, "cycle failed");
            }
            EventKind::ResourceTerminated => {
                info!(target: TARGET, resource, generation = e.generation, reason, "resource terminated");
            }
            EventKind::ResourceEvicted => {
                info!(target: TARGET, resource, generation = e.generation, reason, "resource evicted");
            }
            EventKind::EvictionSuppressed => {
                debug!(target: TARGET, resource, generation = e.generation, "eviction suppressed, owner disposed");
            }
            EventKind::OwnerDisposed => {
                debug!(target: TARGET, resource, "owner disposed");
            }
            EventKind::CacheDisposed => {
                info!(target: TARGET, resource, "cache disposed");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = resource, reason, "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: TARGET, subscriber = resource, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
