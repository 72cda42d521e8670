//! # Composite signal: one lifecycle derived from several.
//!
//! A request-response channel is a sender link plus a receiver link; callers
//! only care whether *the channel* is usable.
//!
//! ```text
//! parts:      sender ──┐
//!                      ├──► all(parts)
//!           receiver ──┘
//!
//! derived:  any part terminal  ─► that part's terminal state (latched)
//!           all parts Active   ─► Active
//!           otherwise          ─► Uninitialized
//! ```
//!
//! ## Rules
//! - The part that terminated first wins, even when several parts terminated
//!   before anybody looked. Its state is latched, so the composite never
//!   changes its mind when another part terminates later.
//! - The derived state only moves forward; `Active` is reported once.

use std::sync::Arc;

use futures::future::{self, BoxFuture};
use parking_lot::Mutex;

use crate::lifecycle::signal::{LifecycleSignal, Source, Stamped, UNSTAMPED};
use crate::lifecycle::state::LifecycleState;

#[derive(Clone)]
pub(super) struct Composite {
    parts: Vec<LifecycleSignal>,
    latched: Arc<Mutex<Option<Stamped>>>,
}

impl Composite {
    pub(super) fn stamped(&self) -> Stamped {
        let mut latched = self.latched.lock();
        if let Some(stamped) = latched.as_ref() {
            return stamped.clone();
        }

        let mut all_active = true;
        let mut first: Option<Stamped> = None;
        for part in &self.parts {
            let stamped = part.stamped();
            if stamped.state.is_terminal() {
                if first.as_ref().is_none_or(|f| stamped.seq < f.seq) {
                    first = Some(stamped);
                }
            } else {
                all_active &= stamped.state.is_active();
            }
        }

        if let Some(first) = first {
            *latched = Some(first.clone());
            return first;
        }

        let state = if all_active {
            LifecycleState::Active
        } else {
            LifecycleState::Uninitialized
        };
        Stamped {
            state,
            seq: UNSTAMPED,
        }
    }

    pub(super) fn changed(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.parts.is_empty() {
                return future::pending().await;
            }
            let waits = self.parts.iter_mut().map(|part| part.changed());
            let _ = future::select_all(waits).await;
        })
    }
}

impl LifecycleSignal {
    /// Derives one signal that is `Active` only while every part is, and
    /// terminates as soon as any part does, carrying that part's state.
    ///
    /// An empty `parts` list is vacuously `Active` and never terminates.
    ///
    /// # Example
    /// ```rust
    /// use amqp_recovery::{LifecycleSignal, LifecycleState, lifecycle};
    ///
    /// let (sender, sender_states) = lifecycle::channel();
    /// let (receiver, receiver_states) = lifecycle::channel();
    /// let channel = LifecycleSignal::all([sender_states, receiver_states]);
    ///
    /// receiver.activate();
    /// assert_eq!(channel.current(), LifecycleState::Uninitialized);
    /// sender.activate();
    /// assert_eq!(channel.current(), LifecycleState::Active);
    /// receiver.complete();
    /// assert_eq!(channel.current(), LifecycleState::Completed);
    /// ```
    pub fn all(parts: impl IntoIterator<Item = LifecycleSignal>) -> Self {
        Self {
            source: Source::All(Composite {
                parts: parts.into_iter().collect(),
                latched: Arc::new(Mutex::new(None)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AmqpError;
    use crate::lifecycle::signal::channel;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn active_only_after_both_in_any_order() {
        for sender_first in [true, false] {
            let (sender, s) = channel();
            let (receiver, r) = channel();
            let mut composite = LifecycleSignal::all([s, r]);

            let waiter = {
                let mut observer = composite.clone();
                tokio::spawn(async move { observer.wait_active().await })
            };

            if sender_first {
                sender.activate();
            } else {
                receiver.activate();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert!(!waiter.is_finished());
            assert_eq!(composite.current(), LifecycleState::Uninitialized);

            if sender_first {
                receiver.activate();
            } else {
                sender.activate();
            }
            assert!(waiter.await.unwrap().is_ok());
            assert!(composite.wait_active().await.is_ok());
        }
    }

    #[tokio::test]
    async fn already_active_parts_emit_active_once() {
        let (sender, s) = channel();
        let (receiver, r) = channel();
        sender.activate();
        receiver.activate();

        let states = LifecycleSignal::all([s, r]).states();
        futures::pin_mut!(states);
        assert_eq!(states.next().await, Some(LifecycleState::Active));

        sender.complete();
        assert_eq!(states.next().await, Some(LifecycleState::Completed));
        assert_eq!(states.next().await, None);
    }

    #[tokio::test]
    async fn first_terminated_part_wins_and_carries_cause() {
        let (sender, s) = channel();
        let (receiver, r) = channel();
        let mut composite = LifecycleSignal::all([s, r]);
        sender.activate();
        receiver.activate();

        let cause = Arc::new(AmqpError::Io {
            message: "receiver detached".into(),
        });
        let observer = {
            let mut observer = composite.clone();
            tokio::spawn(async move { observer.terminated().await })
        };
        tokio::task::yield_now().await;

        receiver.fail(cause.clone());
        match observer.await.unwrap() {
            LifecycleState::Errored(got) => assert!(Arc::ptr_eq(&got, &cause)),
            other => panic!("unexpected {other:?}"),
        }

        // sender is still healthy; a later completion does not override the cause
        assert!(sender.current().is_active());
        sender.complete();
        assert_eq!(composite.terminated().await, LifecycleState::Errored(cause));
    }

    #[test]
    fn earliest_termination_wins_when_observed_late() {
        let (sender, s) = channel();
        let (receiver, r) = channel();
        let composite = LifecycleSignal::all([s, r]);
        sender.activate();
        receiver.activate();

        let first = Arc::new(AmqpError::Io {
            message: "receiver first".into(),
        });
        receiver.fail(first.clone());
        sender.error(AmqpError::Io {
            message: "sender second".into(),
        });

        match composite.current() {
            LifecycleState::Errored(got) => assert!(Arc::ptr_eq(&got, &first)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_composite_keeps_termination_order() {
        let (a, sa) = channel();
        let (b, sb) = channel();
        let (c, sc) = channel();
        let composite = LifecycleSignal::all([LifecycleSignal::all([sa, sb]), sc]);

        c.complete();
        b.error(AmqpError::Io {
            message: "later".into(),
        });
        a.activate();

        assert_eq!(composite.current(), LifecycleState::Completed);
    }

    #[test]
    fn empty_composite_is_active() {
        let composite = LifecycleSignal::all(Vec::new());
        assert!(composite.current().is_active());
    }
}
