//! # Monitor: event bus owner and cache wiring.
//!
//! A [`Monitor`] owns the [`Bus`] every cache of one client publishes on, and
//! forwards the traffic to a [`SubscriberSet`]. It also hands out caches that
//! are already wired to that bus and to the configured retry policy.
//!
//! ```text
//! ConnectionCache ─┐
//! SessionCache ────┼─► Bus ──► listener task ──► SubscriberSet ──► LogWriter, ...
//! ChannelCache ────┘               │
//!                                  └─ lagged: SubscriberOverflow("monitor")
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use amqp_recovery::{Monitor, RecoveryConfig, Subscribe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let subscribers: Vec<Arc<dyn Subscribe>> = Vec::new();
//!     let monitor = Monitor::new(RecoveryConfig::default(), subscribers);
//!     // build caches with monitor.connection_cache(..), monitor.session_cache(..)
//!     monitor.shutdown().await;
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::{KeyedResourceFactory, Recoverable, ResourceFactory};
use crate::config::RecoveryConfig;
use crate::events::{Bus, Event};
use crate::policies::RetryPolicy;
use crate::resources::{
    ChannelCache, ConnectionCache, RequestResponseChannel, ResourceContext, SessionCache,
};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Owns the event bus of one client and fans its events out to subscribers.
pub struct Monitor {
    cfg: RecoveryConfig,
    bus: Bus,
    policy: Arc<dyn RetryPolicy>,
    token: CancellationToken,
    listener: JoinHandle<SubscriberSet>,
}

impl Monitor {
    /// Creates the bus and starts forwarding to `subscribers`.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(cfg: RecoveryConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let set = SubscriberSet::new(subscribers, bus.clone());
        let token = CancellationToken::new();
        let listener = tokio::spawn(listen(bus.subscribe(), set, token.clone()));

        Self {
            policy: cfg.retry_policy(),
            cfg,
            bus,
            token,
            listener,
        }
    }

    /// The bus caches publish on.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The retry policy built from the configuration.
    pub fn retry_policy(&self) -> Arc<dyn RetryPolicy> {
        Arc::clone(&self.policy)
    }

    /// The configuration this monitor was built with.
    pub fn config(&self) -> &RecoveryConfig {
        &self.cfg
    }

    /// A connection cache publishing on this monitor's bus.
    pub fn connection_cache<C: Recoverable + Clone>(
        &self,
        context: ResourceContext,
        factory: impl ResourceFactory<C>,
    ) -> ConnectionCache<C> {
        ConnectionCache::new(context, factory, self.retry_policy(), Some(self.bus.clone()))
    }

    /// A session cache publishing on this monitor's bus.
    pub fn session_cache<S: Recoverable + Clone>(
        &self,
        context: ResourceContext,
        factory: impl KeyedResourceFactory<String, S>,
    ) -> SessionCache<S> {
        SessionCache::new(context, factory, self.retry_policy(), Some(self.bus.clone()))
    }

    /// A request-response channel cache publishing on this monitor's bus.
    pub fn channel_cache<S: Recoverable, R: Recoverable>(
        &self,
        context: ResourceContext,
        factory: impl ResourceFactory<Arc<RequestResponseChannel<S, R>>>,
    ) -> ChannelCache<S, R> {
        ChannelCache::new(context, factory, self.retry_policy(), Some(self.bus.clone()))
    }

    /// Stops forwarding, then lets every subscriber drain its queue.
    ///
    /// Events already on the bus are delivered; events published afterwards
    /// are not.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Ok(set) = self.listener.await {
            set.shutdown().await;
        }
    }
}

async fn listen(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    token: CancellationToken,
) -> SubscriberSet {
    loop {
        tokio::select! {
            biased;
            res = rx.recv() => match res {
                Ok(ev) => set.deliver(Arc::new(ev)),
                Err(RecvError::Lagged(_)) => set.deliver(Arc::new(lagged())),
                Err(RecvError::Closed) => return set,
            },
            _ = token.cancelled() => break,
        }
    }

    loop {
        match rx.try_recv() {
            Ok(ev) => set.deliver(Arc::new(ev)),
            Err(TryRecvError::Lagged(_)) => set.deliver(Arc::new(lagged())),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return set,
        }
    }
}

fn lagged() -> Event {
    Event::subscriber_overflow("monitor", "lagged")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::cache::FactoryFn;
    use crate::cache::testing::{Scripted, Step};
    use crate::error::ErrorCondition;
    use crate::events::EventKind;
    use crate::policies::{JitterPolicy, RetryMode};

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.kinds.lock().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn config() -> RecoveryConfig {
        let mut cfg = RecoveryConfig::default();
        cfg.retry.mode = RetryMode::Fixed;
        cfg.retry.delay = Duration::from_millis(10);
        cfg.retry.jitter = JitterPolicy::None;
        cfg
    }

    #[tokio::test(start_paused = true)]
    async fn cache_events_reach_subscribers() {
        let recorder = Arc::new(Recorder::default());
        let monitor = Monitor::new(config(), vec![recorder.clone() as Arc<dyn Subscribe>]);

        let factory = Scripted::new(
            [Step::Fail(ErrorCondition::ServerBusy)],
            Step::Activate,
        );
        let connections =
            monitor.connection_cache(ResourceContext::new("connection", "ns.example.net"), factory);
        connections.get().await.unwrap();
        connections.dispose();

        monitor.shutdown().await;

        let kinds = recorder.kinds.lock().clone();
        assert_eq!(
            kinds,
            vec![
                EventKind::CycleStarted,
                EventKind::AttemptStarting,
                EventKind::AttemptFailed,
                EventKind::BackoffScheduled,
                EventKind::AttemptStarting,
                EventKind::ResourceActive,
                EventKind::CacheDisposed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn session_cache_is_wired_to_the_bus() {
        let monitor = Monitor::new(config(), Vec::new());
        let mut rx = monitor.bus().subscribe();

        let factory = Scripted::always(Step::Activate);
        let sessions = monitor.session_cache(
            ResourceContext::new("connection", "ns.example.net"),
            FactoryFn::new(move |_name: &String| factory.make()),
        );
        sessions.get("cbs").await.unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::CycleStarted);
        assert_eq!(ev.resource.as_deref(), Some("session 'cbs' (ns.example.net)"));
        monitor.shutdown().await;
    }
}
