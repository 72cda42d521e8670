//! # Request-response channels.
//!
//! A request-response channel (CBS token negotiation, management operations)
//! pairs a sender link with a receiver link. It is usable only while both links
//! are, so its lifecycle is the composite of the two:
//!
//! ```text
//! sender   ──┐
//!            ├─► LifecycleSignal::all ─► Active when both are Active
//! receiver ──┘                           terminal when either terminates
//! ```

use std::sync::Arc;

use crate::cache::{CacheBuilder, Recoverable, RecoverableCache, ResourceFactory};
use crate::error::SharedError;
use crate::events::Bus;
use crate::lifecycle::LifecycleSignal;
use crate::policies::RetryPolicy;
use crate::resources::context::ResourceContext;

const TERMINATED: &str = "Request-response channel cache is terminated.";

/// A sender/receiver link pair recovered as one unit.
#[derive(Debug)]
pub struct RequestResponseChannel<S, R> {
    context: ResourceContext,
    sender: S,
    receiver: R,
    states: LifecycleSignal,
}

impl<S: Recoverable, R: Recoverable> RequestResponseChannel<S, R> {
    /// Pairs two freshly created links.
    pub fn new(context: ResourceContext, sender: S, receiver: R) -> Self {
        let states = LifecycleSignal::all([sender.endpoint_states(), receiver.endpoint_states()]);
        Self {
            context,
            sender,
            receiver,
            states,
        }
    }

    /// The sending link.
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// The receiving link.
    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    /// Identity of the channel.
    pub fn context(&self) -> &ResourceContext {
        &self.context
    }
}

impl<S: Recoverable, R: Recoverable> Recoverable for RequestResponseChannel<S, R> {
    fn endpoint_states(&self) -> LifecycleSignal {
        self.states.clone()
    }

    fn close(&self) {
        self.sender.close();
        self.receiver.close();
    }
}

/// Recoverable cache of one request-response channel.
pub struct ChannelCache<S: Recoverable, R: Recoverable> {
    context: ResourceContext,
    cache: RecoverableCache<Arc<RequestResponseChannel<S, R>>>,
}

impl<S: Recoverable, R: Recoverable> ChannelCache<S, R> {
    /// Creates the cache. No links are opened until the first `get`.
    pub fn new(
        context: ResourceContext,
        factory: impl ResourceFactory<Arc<RequestResponseChannel<S, R>>>,
        policy: Arc<dyn RetryPolicy>,
        bus: Option<Bus>,
    ) -> Self {
        let cache = CacheBuilder::new(context.to_string(), factory, policy)
            .with_bus_opt(bus)
            .with_terminated_message(TERMINATED)
            .build();
        Self { context, cache }
    }

    /// Returns a channel whose links are both active.
    ///
    /// # Errors
    /// The non-retriable error of the population cycle, or the terminated error
    /// after [`ChannelCache::dispose`].
    pub async fn get(&self) -> Result<Arc<RequestResponseChannel<S, R>>, SharedError> {
        self.cache.get().await
    }

    /// Keeps the current channel cached while its owner shuts down.
    pub fn set_owner_disposed(&self) {
        self.cache.set_owner_disposed();
    }

    /// Closes both links and stops recovering the channel. Idempotent.
    pub fn dispose(&self) -> bool {
        self.cache.dispose()
    }

    /// Whether the cache was disposed.
    pub fn is_disposed(&self) -> bool {
        self.cache.is_disposed()
    }

    /// Identity of the cached channel.
    pub fn context(&self) -> &ResourceContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::cache::FactoryFn;
    use crate::cache::testing::{FakeLink, fast_policy, settle};
    use crate::error::{AmqpError, ErrorCondition};
    use crate::lifecycle::LifecycleState;

    type Channel = RequestResponseChannel<Arc<FakeLink>, Arc<FakeLink>>;

    fn ctx() -> ResourceContext {
        ResourceContext::new("channel", "ns.example.net").with_name("$cbs")
    }

    #[tokio::test(start_paused = true)]
    async fn active_only_when_both_links_are() {
        let channel = Channel::new(ctx(), FakeLink::new(0), FakeLink::new(1));
        let states = channel.endpoint_states();

        channel.receiver().handle().activate();
        assert_eq!(states.current(), LifecycleState::Uninitialized);
        channel.sender().handle().activate();
        assert_eq!(states.current(), LifecycleState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn either_link_failing_terminates_with_its_cause() {
        let channel = Channel::new(ctx(), FakeLink::new(0), FakeLink::new(1));
        channel.sender().handle().activate();
        channel.receiver().handle().activate();

        let mut states = channel.endpoint_states();
        channel.receiver().fail(ErrorCondition::LinkDetachForced);
        let terminal = states.terminated().await;
        let cause = channel.receiver().endpoint_states().current().cause().cloned();
        assert!(Arc::ptr_eq(terminal.cause().unwrap(), cause.as_ref().unwrap()));

        channel.close();
        assert!(channel.sender().is_closed());
        assert!(channel.receiver().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn cache_replaces_channel_when_one_link_drops() {
        let links = Arc::new(AtomicUsize::new(0));
        let factory = FactoryFn::new({
            let links = Arc::clone(&links);
            move || {
                let n = links.fetch_add(2, Ordering::SeqCst);
                let sender = FakeLink::new(n);
                let receiver = FakeLink::new(n + 1);
                let (s, r) = (sender.handle().clone(), receiver.handle().clone());
                // links come up in either order
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    r.activate();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    s.activate();
                });
                Ok::<_, AmqpError>(Arc::new(Channel::new(ctx(), sender, receiver)))
            }
        });
        let cache = ChannelCache::new(ctx(), factory, fast_policy(), None);

        let first = cache.get().await.unwrap();
        assert!(first.endpoint_states().current().is_active());

        first.sender().handle().complete();
        settle().await;
        assert!(first.receiver().is_closed());

        let second = cache.get().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.sender().id, 2);

        cache.dispose();
        assert!(second.sender().is_closed());
        assert_eq!(cache.get().await.unwrap_err().to_string(), TERMINATED);
    }
}
