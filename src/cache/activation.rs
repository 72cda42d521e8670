//! # One activation attempt.
//!
//! Waits for a freshly created instance to reach `Active`, bounded by the
//! policy's try-timeout and by the cache's cancellation token.
//!
//! ```text
//! signal.wait_active() ─┬─ Active                 ─► Activation::Active
//!                       ├─ Completed first        ─► Failed(Closed)
//!                       ├─ Errored(cause) first   ─► Failed(cause)
//!                       └─ try-timeout elapsed    ─► publish ActivationTimeout
//!                                                    Failed(Timeout)
//! token.cancelled()     ─────────────────────────► Activation::Cancelled
//! ```
//!
//! ## Rules
//! - The timeout is per attempt; every retry gets a fresh window.
//! - All three failure shapes are handed to the retry policy identically.
//! - A zero timeout means "no timeout".

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::cache::reporter::Reporter;
use crate::error::{AmqpError, SharedError};
use crate::events::{Event, EventKind};
use crate::lifecycle::{LifecycleSignal, LifecycleState};

/// Outcome of one activation attempt.
pub(crate) enum Activation {
    /// The instance is active.
    Active,
    /// The instance failed to activate.
    Failed(SharedError),
    /// The cache was disposed while waiting.
    Cancelled,
}

/// Waits for `signal` to become active.
pub(crate) async fn activate(
    signal: &mut LifecycleSignal,
    timeout: Duration,
    token: &CancellationToken,
    attempt: u32,
    reporter: &Reporter,
) -> Activation {
    let wait = async {
        // zero means no bound
        if !timeout.is_zero() {
            match time::timeout(timeout, signal.wait_active()).await {
                Ok(res) => res.map_err(|state| failure(state, reporter)),
                Err(_elapsed) => {
                    reporter.publish(
                        Event::new(EventKind::ActivationTimeout)
                            .with_attempt(attempt)
                            .with_timeout(timeout),
                    );
                    Err(Arc::new(AmqpError::Timeout {
                        what: reporter.resource().to_string(),
                        timeout,
                    }))
                }
            }
        } else {
            signal
                .wait_active()
                .await
                .map_err(|state| failure(state, reporter))
        }
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Activation::Cancelled,
        res = wait => match res {
            Ok(()) => Activation::Active,
            Err(err) => Activation::Failed(err),
        },
    }
}

/// Maps a terminal state reached before `Active` to its error.
fn failure(state: LifecycleState, reporter: &Reporter) -> SharedError {
    match state {
        LifecycleState::Errored(cause) => cause,
        _ => Arc::new(AmqpError::Closed {
            what: reporter.resource().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Bus;
    use crate::lifecycle;

    fn reporter() -> Reporter {
        Reporter::new(Arc::from("link 'test'"), None)
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_synthesized() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let reporter = Reporter::new(Arc::from("link 'slow'"), Some(bus));
        let (_handle, mut signal) = lifecycle::channel();

        let out = activate(
            &mut signal,
            Duration::from_secs(2),
            &CancellationToken::new(),
            3,
            &reporter,
        )
        .await;

        match out {
            Activation::Failed(err) => {
                assert!(matches!(&*err, AmqpError::Timeout { timeout, .. } if *timeout == Duration::from_secs(2)));
            }
            _ => panic!("expected timeout"),
        }
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ActivationTimeout);
        assert_eq!(ev.attempt, Some(3));
        assert_eq!(ev.timeout_ms, Some(2_000));
    }

    #[tokio::test]
    async fn completed_before_active_is_closed_error() {
        let (handle, mut signal) = lifecycle::channel();
        handle.complete();
        let out = activate(
            &mut signal,
            Duration::from_secs(1),
            &CancellationToken::new(),
            0,
            &reporter(),
        )
        .await;
        assert!(matches!(out, Activation::Failed(err) if matches!(&*err, AmqpError::Closed { .. })));
    }

    #[tokio::test]
    async fn cancellation_wins() {
        let (_handle, mut signal) = lifecycle::channel();
        let token = CancellationToken::new();
        token.cancel();
        let out = activate(&mut signal, Duration::ZERO, &token, 0, &reporter()).await;
        assert!(matches!(out, Activation::Cancelled));
    }
}
