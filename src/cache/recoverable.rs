//! # RecoverableCache: one cached, self-healing resource.
//!
//! Makes an asynchronously activated, failure-prone resource look like a single
//! stable value. All callers share one accessor, [`RecoverableCache::get`].
//!
//! ## Architecture
//! ```text
//! get() ──► lock state
//!             ├─ disposed                         ─► Err(terminated)
//!             ├─ entry, not terminated            ─► Ok(instance)        (fast path)
//!             ├─ entry, terminated, owner disposed ─► Ok(stale instance)
//!             ├─ cycle in flight                  ─► attach to its outcome
//!             └─ otherwise                        ─► start cycle (generation += 1)
//!                                                    tokio::spawn(populate)
//!
//! populate ──► success ─► entry = { instance, signal, generation }
//!          │             spawn watcher(signal, generation)
//!          └─► failure ─► entry stays empty, waiters get the same Arc'd error
//!
//! watcher ──► signal terminated
//!               ├─ entry.generation != generation ─► ignore (stale)
//!               ├─ owner disposed                 ─► EvictionSuppressed
//!               └─ otherwise                      ─► evict + close
//! ```
//!
//! ## Rules
//! - At most one population cycle per cache at any time (single-flight).
//! - Only instances that reached `Active` are ever handed out.
//! - Once disposed, the factory is never invoked again.
//! - A caller dropping its `get()` future detaches only that caller; the cycle
//!   runs on its own task.
//! - No lock is held across an `.await`.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::builder::CacheBuilder;
use crate::cache::factory::{Recoverable, ResourceFactory};
use crate::cache::reporter::Reporter;
use crate::error::{AmqpError, SharedError};
use crate::events::{Event, EventKind};
use crate::lifecycle::{LifecycleSignal, LifecycleState};
use crate::policies::RetryPolicy;

pub(super) type Outcome<T> = Shared<BoxFuture<'static, Result<T, SharedError>>>;

/// The active resource currently handed out.
pub(super) struct CachedEntry<T> {
    pub(super) instance: T,
    pub(super) signal: LifecycleSignal,
    pub(super) generation: u64,
}

/// Outcome shared by every waiter of the running cycle.
pub(super) struct Inflight<T> {
    generation: u64,
    outcome: Outcome<T>,
}

/// What the synchronous half of `get()` decided.
pub(super) enum Begin<T> {
    Ready(Result<T, SharedError>),
    Wait {
        outcome: Outcome<T>,
        stale: Option<CachedEntry<T>>,
    },
}

pub(super) struct State<T> {
    pub(super) entry: Option<CachedEntry<T>>,
    inflight: Option<Inflight<T>>,
    pub(super) disposed: bool,
    owner_disposed: bool,
    generation: u64,
}

impl<T> State<T> {
    /// Forgets the in-flight cycle if it is still `generation`.
    pub(super) fn clear_inflight(&mut self, generation: u64) {
        if self
            .inflight
            .as_ref()
            .is_some_and(|f| f.generation == generation)
        {
            self.inflight = None;
        }
    }
}

pub(super) struct Inner<T: Recoverable + Clone> {
    pub(super) reporter: Reporter,
    pub(super) factory: Arc<dyn ResourceFactory<T>>,
    pub(super) policy: Arc<dyn RetryPolicy>,
    pub(super) terminated: SharedError,
    pub(super) token: CancellationToken,
    pub(super) state: Mutex<State<T>>,
}

impl<T: Recoverable + Clone> Inner<T> {
    pub(super) fn terminated(&self) -> SharedError {
        Arc::clone(&self.terminated)
    }

    fn start_cycle(self: &Arc<Self>, state: &mut State<T>) -> Outcome<T> {
        state.generation += 1;
        let generation = state.generation;

        let join = tokio::spawn(Arc::clone(self).populate(generation));
        let weak = Arc::downgrade(self);
        let what = self.reporter.resource().to_string();

        let outcome = async move {
            match join.await {
                Ok(res) => res,
                Err(_join_err) => {
                    let err: SharedError = Arc::new(AmqpError::Aborted { what });
                    if let Some(inner) = weak.upgrade() {
                        inner.fail_cycle(generation, &err);
                    }
                    Err(err)
                }
            }
        }
        .boxed()
        .shared();

        state.inflight = Some(Inflight {
            generation,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Spawns the termination watcher for a freshly cached entry.
    pub(super) fn watch(self: &Arc<Self>, mut signal: LifecycleSignal, generation: u64) {
        let weak = Arc::downgrade(self);
        let token = self.token.clone();
        tokio::spawn(async move {
            let terminal = tokio::select! {
                state = signal.terminated() => state,
                _ = token.cancelled() => return,
            };
            if let Some(inner) = weak.upgrade() {
                inner.on_terminated(generation, terminal);
            }
        });
    }

    fn on_terminated(&self, generation: u64, terminal: LifecycleState) {
        let evicted = {
            let mut state = self.state.lock();
            let current = state
                .entry
                .as_ref()
                .is_some_and(|e| e.generation == generation);
            if !current || state.disposed {
                return;
            }
            self.reporter.publish(
                Event::new(EventKind::ResourceTerminated)
                    .with_generation(generation)
                    .with_reason(terminal.to_string()),
            );
            if state.owner_disposed {
                self.reporter.publish(
                    Event::new(EventKind::EvictionSuppressed).with_generation(generation),
                );
                return;
            }
            state.entry.take()
        };
        if let Some(entry) = evicted {
            self.release(entry, "terminated");
        }
    }

    fn release(&self, entry: CachedEntry<T>, why: &'static str) {
        entry.instance.close();
        self.reporter.publish(
            Event::new(EventKind::ResourceEvicted)
                .with_generation(entry.generation)
                .with_reason(why),
        );
    }
}

impl<T: Recoverable + Clone> Drop for Inner<T> {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(entry) = self.state.get_mut().entry.take() {
            entry.instance.close();
        }
    }
}

/// A single recoverable resource shared by all callers.
///
/// Cloning is cheap and yields another handle to the same cache. Dropping the
/// last handle releases the cached instance.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use amqp_recovery::{
///     AmqpError, AmqpRetryPolicy, CacheBuilder, FactoryFn, LifecycleHandle, LifecycleSignal,
///     Recoverable, lifecycle,
/// };
///
/// #[derive(Debug)]
/// struct Session { handle: LifecycleHandle, states: LifecycleSignal }
///
/// impl Recoverable for Session {
///     fn endpoint_states(&self) -> LifecycleSignal { self.states.clone() }
///     fn close(&self) { self.handle.complete(); }
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Arc<AmqpError>> {
///     let factory = FactoryFn::new(|| {
///         let (handle, states) = lifecycle::channel();
///         handle.activate(); // a real engine activates asynchronously
///         Ok::<_, AmqpError>(Arc::new(Session { handle, states }))
///     });
///     let cache = CacheBuilder::new("session 'demo'", factory, Arc::new(AmqpRetryPolicy::default()))
///         .build();
///
///     let first = cache.get().await?;
///     let second = cache.get().await?;
///     assert!(Arc::ptr_eq(&first, &second));
///
///     cache.dispose();
///     assert!(cache.get().await.unwrap_err().is_terminated());
///     Ok(())
/// }
/// ```
pub struct RecoverableCache<T: Recoverable + Clone> {
    inner: Arc<Inner<T>>,
}

impl<T: Recoverable + Clone> Clone for RecoverableCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Recoverable + Clone> RecoverableCache<T> {
    /// Starts building a cache for the resource described by `resource`.
    pub fn builder(
        resource: impl Into<Arc<str>>,
        factory: impl ResourceFactory<T>,
        policy: Arc<dyn RetryPolicy>,
    ) -> CacheBuilder<T> {
        CacheBuilder::new(resource, factory, policy)
    }

    pub(super) fn from_parts(
        reporter: Reporter,
        factory: Arc<dyn ResourceFactory<T>>,
        policy: Arc<dyn RetryPolicy>,
        terminated: SharedError,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                reporter,
                factory,
                policy,
                terminated,
                token: CancellationToken::new(),
                state: Mutex::new(State {
                    entry: None,
                    inflight: None,
                    disposed: false,
                    owner_disposed: false,
                    generation: 0,
                }),
            }),
        }
    }

    /// Returns the active resource, creating (and retrying) it if necessary.
    ///
    /// Concurrent callers share one population cycle and observe the same
    /// instance or the same error allocation.
    ///
    /// # Errors
    /// - the non-retriable error that ended the population cycle;
    /// - [`AmqpError::Terminated`] once the cache is disposed.
    pub async fn get(&self) -> Result<T, SharedError> {
        let begin = self.begin();
        self.finish(begin).await
    }

    /// Synchronous half of [`RecoverableCache::get`]: serves the fast path or
    /// joins (starting if needed) the population cycle.
    pub(super) fn begin(&self) -> Begin<T> {
        let mut state = self.inner.state.lock();
        if state.disposed {
            return Begin::Ready(Err(self.inner.terminated()));
        }

        let mut stale = None;
        if let Some(entry) = &state.entry {
            if state.owner_disposed || !entry.signal.is_terminated() {
                return Begin::Ready(Ok(entry.instance.clone()));
            }
            // terminated before the watcher got to it
            stale = state.entry.take();
        }

        let outcome = match &state.inflight {
            Some(inflight) => inflight.outcome.clone(),
            None => self.inner.start_cycle(&mut state),
        };
        Begin::Wait { outcome, stale }
    }

    pub(super) async fn finish(&self, begin: Begin<T>) -> Result<T, SharedError> {
        match begin {
            Begin::Ready(res) => res,
            Begin::Wait { outcome, stale } => {
                if let Some(entry) = stale {
                    self.inner.release(entry, "terminated");
                }
                outcome.await
            }
        }
    }

    /// No entry cached and no cycle running.
    pub(super) fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        state.entry.is_none() && state.inflight.is_none()
    }

    /// Returns the cached instance without populating, even if it terminated.
    pub fn peek(&self) -> Option<T> {
        let state = self.inner.state.lock();
        state.entry.as_ref().map(|e| e.instance.clone())
    }

    /// Drops the cached entry regardless of its state. Returns whether one was present.
    pub(crate) fn evict(&self) -> bool {
        let entry = self.inner.state.lock().entry.take();
        match entry {
            Some(entry) => {
                self.inner.release(entry, "explicit");
                true
            }
            None => false,
        }
    }

    /// Suppresses auto-eviction: a terminated entry keeps being returned until
    /// the cache is disposed. Used while the owning resource tears down.
    pub fn set_owner_disposed(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.owner_disposed {
                return;
            }
            state.owner_disposed = true;
        }
        self.inner
            .reporter
            .publish(Event::new(EventKind::OwnerDisposed));
    }

    /// Disposes the cache: closes the cached instance, fails in-flight waiters
    /// with the terminated error and interrupts pending backoff sleeps.
    ///
    /// Idempotent; returns `true` only for the call that disposed the cache.
    pub fn dispose(&self) -> bool {
        let entry = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return false;
            }
            state.disposed = true;
            state.inflight = None;
            self.inner.token.cancel();
            state.entry.take()
        };

        if let Some(entry) = entry {
            entry.instance.close();
        }
        self.inner
            .reporter
            .publish(Event::new(EventKind::CacheDisposed));
        true
    }

    /// Whether [`RecoverableCache::dispose`] was called.
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Whether the owner marked itself as disposing.
    pub fn is_owner_disposed(&self) -> bool {
        self.inner.state.lock().owner_disposed
    }

    /// Name used in events and error messages.
    pub fn resource(&self) -> &str {
        self.inner.reporter.resource()
    }
}
