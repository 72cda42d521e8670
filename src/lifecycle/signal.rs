//! # Observable lifecycle signal.
//!
//! [`channel`] returns a publisher ([`LifecycleHandle`]) and an observer
//! ([`LifecycleSignal`]) backed by [`tokio::sync::watch`]. Late observers see the
//! latest state immediately, so a resource that became active before anybody
//! looked is still observed as active.
//!
//! ## Rules
//! - Duplicate states are not re-published (`Active` appears at most once).
//! - Nothing follows a terminal state.
//! - Dropping every [`LifecycleHandle`] reads as `Completed`.
//!
//! ## Example
//! ```rust
//! use amqp_recovery::{LifecycleState, lifecycle};
//!
//! let (handle, signal) = lifecycle::channel();
//! assert_eq!(signal.current(), LifecycleState::Uninitialized);
//!
//! assert!(handle.activate());
//! assert!(!handle.activate()); // duplicate, ignored
//! assert!(handle.complete());
//! assert!(!handle.activate()); // terminal, ignored
//! assert_eq!(signal.current(), LifecycleState::Completed);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::Stream;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::error::{AmqpError, SharedError};
use crate::lifecycle::composite::Composite;
use crate::lifecycle::state::LifecycleState;

/// Global order of terminal transitions across all signals.
static TERMINAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Stamp of a terminal state whose publishers vanished without publishing one.
pub(super) const UNSTAMPED: u64 = u64::MAX;

/// A state plus the order in which it became terminal (meaningless otherwise).
#[derive(Clone, Debug)]
pub(super) struct Stamped {
    pub(super) state: LifecycleState,
    pub(super) seq: u64,
}

/// Creates a new lifecycle channel starting at `Uninitialized`.
pub fn channel() -> (LifecycleHandle, LifecycleSignal) {
    let (tx, rx) = watch::channel(Stamped {
        state: LifecycleState::Uninitialized,
        seq: UNSTAMPED,
    });
    (
        LifecycleHandle { tx: Arc::new(tx) },
        LifecycleSignal::from_receiver(rx),
    )
}

/// Publishing side of a lifecycle signal, held by the protocol engine.
#[derive(Clone, Debug)]
pub struct LifecycleHandle {
    tx: Arc<watch::Sender<Stamped>>,
}

impl LifecycleHandle {
    /// Publishes `Active`. Returns `false` if ignored.
    pub fn activate(&self) -> bool {
        self.transition(LifecycleState::Active)
    }

    /// Publishes `Completed`. Returns `false` if ignored.
    pub fn complete(&self) -> bool {
        self.transition(LifecycleState::Completed)
    }

    /// Publishes `Errored(cause)`. Returns `false` if ignored.
    pub fn error(&self, cause: AmqpError) -> bool {
        self.fail(Arc::new(cause))
    }

    /// Publishes `Errored` with an already shared cause.
    pub fn fail(&self, cause: SharedError) -> bool {
        self.transition(LifecycleState::Errored(cause))
    }

    /// The last published state.
    pub fn current(&self) -> LifecycleState {
        self.tx.borrow().state.clone()
    }

    /// A new observer of this signal.
    pub fn subscribe(&self) -> LifecycleSignal {
        LifecycleSignal::from_receiver(self.tx.subscribe())
    }

    pub(super) fn transition(&self, next: LifecycleState) -> bool {
        self.tx.send_if_modified(|current| {
            let allowed = !current.state.is_terminal()
                && current.state != next
                && !matches!(next, LifecycleState::Uninitialized);
            if allowed {
                // stamped under the channel's write lock
                if next.is_terminal() {
                    current.seq = TERMINAL_SEQ.fetch_add(1, Ordering::Relaxed);
                }
                current.state = next;
            }
            allowed
        })
    }
}

#[derive(Clone)]
pub(super) enum Source {
    Single(watch::Receiver<Stamped>),
    All(Composite),
}

/// Observing side of a lifecycle signal.
///
/// Either a single endpoint's states or a composite derived from several
/// signals (see [`LifecycleSignal::all`]). Cloning yields an independent observer.
#[derive(Clone)]
pub struct LifecycleSignal {
    pub(super) source: Source,
}

impl fmt::Debug for LifecycleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleSignal")
            .field("state", &self.current())
            .finish()
    }
}

impl LifecycleSignal {
    fn from_receiver(rx: watch::Receiver<Stamped>) -> Self {
        Self {
            source: Source::Single(rx),
        }
    }

    /// The current (derived) state.
    pub fn current(&self) -> LifecycleState {
        self.stamped().state
    }

    /// The current state with its termination stamp.
    pub(super) fn stamped(&self) -> Stamped {
        match &self.source {
            Source::Single(rx) => {
                let stamped = rx.borrow().clone();
                if !stamped.state.is_terminal() && rx.has_changed().is_err() {
                    // every publisher is gone
                    Stamped {
                        state: LifecycleState::Completed,
                        seq: UNSTAMPED,
                    }
                } else {
                    stamped
                }
            }
            Source::All(composite) => composite.stamped(),
        }
    }

    /// `true` once a terminal state was reached.
    pub fn is_terminated(&self) -> bool {
        self.current().is_terminal()
    }

    /// Resolves after the signal may have moved. Spurious wake-ups are possible.
    pub(super) fn changed(&mut self) -> BoxFuture<'_, ()> {
        match &mut self.source {
            // A closed channel errors out here; `current()` then reports `Completed`.
            Source::Single(rx) => Box::pin(async move {
                let _ = rx.changed().await;
            }),
            Source::All(composite) => composite.changed(),
        }
    }

    /// Waits until the signal is `Active`.
    ///
    /// Fails with the terminal state if the signal terminates first.
    pub async fn wait_active(&mut self) -> Result<(), LifecycleState> {
        loop {
            let state = self.current();
            if state.is_active() {
                return Ok(());
            }
            if state.is_terminal() {
                return Err(state);
            }
            self.changed().await;
        }
    }

    /// Waits until the signal terminates and returns the terminal state.
    pub async fn terminated(&mut self) -> LifecycleState {
        loop {
            let state = self.current();
            if state.is_terminal() {
                return state;
            }
            self.changed().await;
        }
    }

    /// Distinct states in order, ending after the terminal one.
    ///
    /// States that come and go between two polls are not replayed; the stream
    /// reports what an observer actually saw.
    pub fn states(self) -> impl Stream<Item = LifecycleState> + Send {
        futures::stream::unfold(
            (self, None::<LifecycleState>),
            |(mut signal, last)| async move {
                if last.as_ref().is_some_and(LifecycleState::is_terminal) {
                    return None;
                }
                loop {
                    let state = signal.current();
                    if last.as_ref() != Some(&state) {
                        return Some((state.clone(), (signal, Some(state))));
                    }
                    signal.changed().await;
                }
            },
        )
    }
}
