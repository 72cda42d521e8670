//! # Non-blocking fan-out of events to subscribers.
//!
//! ```text
//! deliver(event)
//!     ├─ accepts? ──► try_send ──► [queue 1] ──► worker 1 ──► on_event()
//!     │                                             └─ panic ──► SubscriberPanicked
//!     ├─ accepts? ──► try_send ──► [queue 2] ──► worker 2 ──► on_event()
//!     └─ full / closed ──► SubscriberOverflow (published on the bus)
//! ```
//!
//! ## Rules
//! - `deliver` never waits; a full queue drops the event for that subscriber only.
//! - Per-subscriber FIFO, no ordering across subscribers.
//! - Overflow notices about overflow notices are not published, which would loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Queue {
    subscriber: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Per-subscriber queues and workers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Problems are reported on `bus`.
    #[must_use]
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut queues = Vec::with_capacity(subscribers.len());
        let mut workers = Vec::with_capacity(subscribers.len());

        for subscriber in subscribers {
            let (tx, rx) = mpsc::channel(subscriber.queue_capacity().max(1));
            workers.push(tokio::spawn(work(
                Arc::clone(&subscriber),
                rx,
                bus.clone(),
            )));
            queues.push(Queue { subscriber, tx });
        }
        Self {
            queues,
            workers,
            bus,
        }
    }

    /// Queues `event` for every subscriber that accepts its kind.
    pub fn deliver(&self, event: Arc<Event>) {
        let overflow_notice = event.kind == EventKind::SubscriberOverflow;

        for queue in &self.queues {
            if !queue.subscriber.accepts(event.kind) {
                continue;
            }
            let reason = match queue.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if !overflow_notice {
                self.bus
                    .publish(Event::subscriber_overflow(queue.subscriber.name(), reason));
            }
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// `true` if there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Closes every queue and waits until the workers drained them.
    pub async fn shutdown(self) {
        drop(self.queues);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn work(subscriber: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(event) = rx.recv().await {
        let handled = AssertUnwindSafe(subscriber.on_event(&event))
            .catch_unwind()
            .await;
        if let Err(panic) = handled {
            bus.publish(Event::subscriber_panicked(
                subscriber.name(),
                panic_message(&*panic),
            ));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct Counter {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _event: &Event) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }

        fn accepts(&self, kind: EventKind) -> bool {
            kind != EventKind::AttemptStarting
        }

        fn name(&self) -> &'static str {
            "counter"
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _event: &Event) {
            panic!("boom");
        }

        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    struct Stuck;

    #[async_trait]
    impl Subscribe for Stuck {
        async fn on_event(&self, _event: &Event) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        fn name(&self) -> &'static str {
            "stuck"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn filters_before_queueing() {
        let counter = Arc::new(Counter::default());
        let set = SubscriberSet::new(vec![counter.clone() as Arc<dyn Subscribe>], Bus::new(8));

        set.deliver(Arc::new(Event::new(EventKind::AttemptStarting)));
        set.deliver(Arc::new(Event::new(EventKind::ResourceActive)));
        set.shutdown().await;

        assert_eq!(counter.seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panic_is_reported_and_worker_survives() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Panicky) as Arc<dyn Subscribe>], bus);

        set.deliver(Arc::new(Event::new(EventKind::CacheDisposed)));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.resource.as_deref(), Some("panicky"));
        assert_eq!(ev.reason.as_deref(), Some("boom"));

        set.deliver(Arc::new(Event::new(EventKind::CacheDisposed)));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::SubscriberPanicked);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_reports_overflow() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Stuck) as Arc<dyn Subscribe>], bus);

        for _ in 0..3 {
            set.deliver(Arc::new(Event::new(EventKind::ResourceActive)));
            tokio::task::yield_now().await;
        }

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.resource.as_deref(), Some("stuck"));
        assert_eq!(ev.reason.as_deref(), Some("full"));
    }
}
