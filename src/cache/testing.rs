//! Test doubles shared by the cache and resource tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::factory::{Recoverable, ResourceFactory};
use crate::error::{AmqpError, ErrorCondition};
use crate::lifecycle::{self, LifecycleHandle, LifecycleSignal};
use crate::policies::{AmqpRetryPolicy, JitterPolicy, RetryMode, RetryOptions, RetryPolicy};

/// A link whose lifecycle the test drives by hand.
#[derive(Debug)]
pub(crate) struct FakeLink {
    pub(crate) id: usize,
    handle: LifecycleHandle,
    states: LifecycleSignal,
    closed: AtomicBool,
}

impl FakeLink {
    pub(crate) fn new(id: usize) -> Arc<Self> {
        let (handle, states) = lifecycle::channel();
        Arc::new(Self {
            id,
            handle,
            states,
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn handle(&self) -> &LifecycleHandle {
        &self.handle
    }

    pub(crate) fn fail(&self, condition: ErrorCondition) {
        self.handle.error(AmqpError::endpoint(condition, "remote detach"));
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Recoverable for FakeLink {
    fn endpoint_states(&self) -> LifecycleSignal {
        self.states.clone()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.handle.complete();
    }
}

/// What the scripted factory does for one attempt.
#[derive(Clone, Debug)]
pub(crate) enum Step {
    /// Active immediately.
    Activate,
    /// Active after the given delay.
    ActivateAfter(Duration),
    /// Errored immediately with the condition.
    Fail(ErrorCondition),
    /// Completed before ever being active.
    Complete,
    /// Never changes state.
    Hang,
    /// `create()` itself fails.
    Refuse,
}

/// Factory that follows a script, then repeats `fallback`.
pub(crate) struct Scripted {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    created: Mutex<Vec<Arc<FakeLink>>>,
}

impl Scripted {
    pub(crate) fn new(script: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            created: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn always(step: Step) -> Arc<Self> {
        Self::new([], step)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn created(&self) -> Vec<Arc<FakeLink>> {
        self.created.lock().clone()
    }

    pub(crate) fn make(&self) -> Result<Arc<FakeLink>, AmqpError> {
        let id = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let link = match step {
            Step::Refuse => {
                return Err(AmqpError::Factory {
                    what: "link".into(),
                    reason: "scripted refusal".into(),
                });
            }
            Step::Activate => {
                let link = FakeLink::new(id);
                link.handle.activate();
                link
            }
            Step::ActivateAfter(delay) => {
                let link = FakeLink::new(id);
                let handle = link.handle.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    handle.activate();
                });
                link
            }
            Step::Fail(condition) => {
                let link = FakeLink::new(id);
                link.fail(condition);
                link
            }
            Step::Complete => {
                let link = FakeLink::new(id);
                link.handle.complete();
                link
            }
            Step::Hang => FakeLink::new(id),
        };
        self.created.lock().push(Arc::clone(&link));
        Ok(link)
    }
}

impl ResourceFactory<Arc<FakeLink>> for Scripted {
    fn create(&self) -> Result<Arc<FakeLink>, AmqpError> {
        self.make()
    }
}

/// Fixed 10ms delays, no jitter, 1s try-timeout, `max_retries = 3`.
pub(crate) fn fast_policy() -> Arc<dyn RetryPolicy> {
    Arc::new(AmqpRetryPolicy::new(RetryOptions {
        max_retries: 3,
        delay: Duration::from_millis(10),
        max_delay: Duration::from_secs(1),
        try_timeout: Duration::from_secs(1),
        mode: RetryMode::Fixed,
        jitter: JitterPolicy::None,
    }))
}

/// Delegates to [`fast_policy`] and records the attempt index it is asked about.
pub(crate) struct Recording {
    inner: Arc<dyn RetryPolicy>,
    seen: Mutex<Vec<u32>>,
}

impl Recording {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: fast_policy(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn seen(&self) -> Vec<u32> {
        self.seen.lock().clone()
    }
}

impl RetryPolicy for Recording {
    fn calculate_retry_delay(&self, error: &AmqpError, attempt: u32) -> Option<Duration> {
        self.seen.lock().push(attempt);
        self.inner.calculate_retry_delay(error, attempt)
    }

    fn max_retries(&self) -> u32 {
        self.inner.max_retries()
    }

    fn try_timeout(&self) -> Duration {
        self.inner.try_timeout()
    }
}

/// Lets spawned tasks run; with a paused clock this also fires due timers.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
