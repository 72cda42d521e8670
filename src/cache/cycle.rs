//! # Population cycle: create, activate, retry.
//!
//! One cycle runs on its own task per cache, started by the first `get()` that
//! finds no usable entry. Its outcome is shared by every waiter.
//!
//! ## Event flow
//! ```text
//! CycleStarted
//!   └─► AttemptStarting → factory.create()
//!         ├─► Err(e)                    → CycleFailed (e, never retried)
//!         └─► activate(signal)
//!               ├─► Active             → ResourceActive (entry stored)
//!               ├─► Cancelled          → close, terminated
//!               └─► Failed(e)          → close, AttemptFailed
//!                     ├─► policy: None → CycleFailed (e)
//!                     └─► policy: d    → BackoffScheduled → sleep(d) → next attempt
//! ```
//!
//! ## Rules
//! - The attempt counter starts at 0 for every cycle.
//! - Attempts are unbounded while failures stay retriable; the policy sees
//!   `min(attempt, max_retries)`, so the delay plateaus instead of giving up.
//! - Disposal interrupts the activation wait and the backoff sleep.
//! - The factory is never called once `disposed` is set.

use std::sync::Arc;

use tokio::{select, time};

use crate::cache::activation::{Activation, activate};
use crate::cache::factory::Recoverable;
use crate::cache::recoverable::{CachedEntry, Inner};
use crate::error::SharedError;
use crate::events::{Event, EventKind};
use crate::lifecycle::LifecycleSignal;

impl<T: Recoverable + Clone> Inner<T> {
    /// Runs one population cycle to completion.
    pub(super) async fn populate(self: Arc<Self>, generation: u64) -> Result<T, SharedError> {
        self.reporter
            .publish(Event::new(EventKind::CycleStarted).with_generation(generation));

        let res = self.attempts(generation).await;
        if let Err(err) = &res {
            self.fail_cycle(generation, err);
        }
        res
    }

    /// Calls the factory unless the cache is disposed.
    ///
    /// The state lock is held across `create()`, so a concurrent `dispose()`
    /// either happens first and is seen here, or happens after and cancels the
    /// activation wait of the new instance.
    fn create(&self) -> Result<T, SharedError> {
        let state = self.state.lock();
        if state.disposed {
            return Err(self.terminated());
        }
        let res = self.factory.create().map_err(Arc::new);
        drop(state);
        res
    }

    async fn attempts(self: &Arc<Self>, generation: u64) -> Result<T, SharedError> {
        let mut attempt: u32 = 0;

        loop {
            if self.token.is_cancelled() {
                return Err(self.terminated());
            }

            self.reporter.publish(
                Event::new(EventKind::AttemptStarting)
                    .with_generation(generation)
                    .with_attempt(attempt),
            );
            let instance = self.create()?;
            let mut signal = instance.endpoint_states();

            let err = match activate(
                &mut signal,
                self.policy.try_timeout(),
                &self.token,
                attempt,
                &self.reporter,
            )
            .await
            {
                Activation::Active => return self.store(generation, attempt, instance, signal),
                Activation::Cancelled => {
                    instance.close();
                    return Err(self.terminated());
                }
                Activation::Failed(err) => err,
            };

            instance.close();
            self.reporter.publish(
                Event::new(EventKind::AttemptFailed)
                    .with_attempt(attempt)
                    .with_reason(err.to_string()),
            );

            let index = attempt.min(self.policy.max_retries());
            let Some(delay) = self.policy.calculate_retry_delay(&err, index) else {
                return Err(err);
            };

            self.reporter.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_attempt(attempt)
                    .with_delay(delay)
                    .with_reason(err.to_string()),
            );
            attempt = attempt.saturating_add(1);

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = self.token.cancelled() => return Err(self.terminated()),
            }
        }
    }

    /// Caches an activated instance unless the cache was disposed meanwhile.
    fn store(
        self: &Arc<Self>,
        generation: u64,
        attempt: u32,
        instance: T,
        signal: LifecycleSignal,
    ) -> Result<T, SharedError> {
        {
            let mut state = self.state.lock();
            if state.disposed {
                drop(state);
                instance.close();
                return Err(self.terminated());
            }
            state.entry = Some(CachedEntry {
                instance: instance.clone(),
                signal: signal.clone(),
                generation,
            });
            state.clear_inflight(generation);
        }

        self.reporter.publish(
            Event::new(EventKind::ResourceActive)
                .with_generation(generation)
                .with_attempt(attempt),
        );
        self.watch(signal, generation);
        Ok(instance)
    }

    /// Forgets a failed cycle so the next `get()` starts a fresh one.
    pub(super) fn fail_cycle(&self, generation: u64, err: &SharedError) {
        self.state.lock().clear_inflight(generation);
        self.reporter.publish(
            Event::new(EventKind::CycleFailed)
                .with_generation(generation)
                .with_reason(err.to_string()),
        );
    }
}
