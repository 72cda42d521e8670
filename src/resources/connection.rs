use std::sync::Arc;

use crate::cache::{CacheBuilder, Recoverable, RecoverableCache, ResourceFactory};
use crate::error::SharedError;
use crate::events::Bus;
use crate::policies::RetryPolicy;
use crate::resources::context::ResourceContext;

const TERMINATED: &str = "Connection recovery support is terminated.";

/// Recoverable cache of the physical connection to a namespace.
///
/// Sessions and channels are created on whatever connection [`ConnectionCache::get`]
/// returns; when the connection drops, the next `get` dials a new one.
pub struct ConnectionCache<C: Recoverable + Clone> {
    context: ResourceContext,
    cache: RecoverableCache<C>,
}

impl<C: Recoverable + Clone> ConnectionCache<C> {
    /// Creates the cache. No connection is opened until the first `get`.
    pub fn new(
        context: ResourceContext,
        factory: impl ResourceFactory<C>,
        policy: Arc<dyn RetryPolicy>,
        bus: Option<Bus>,
    ) -> Self {
        let cache = CacheBuilder::new(context.to_string(), factory, policy)
            .with_bus_opt(bus)
            .with_terminated_message(TERMINATED)
            .build();
        Self { context, cache }
    }

    /// Returns the active connection, dialing (and retrying) if necessary.
    ///
    /// # Errors
    /// The non-retriable error of the dial cycle, or the terminated error after
    /// [`ConnectionCache::dispose`].
    pub async fn get(&self) -> Result<C, SharedError> {
        self.cache.get().await
    }

    /// `true` when no connection is cached or the cached one has terminated.
    pub fn is_current_closed(&self) -> bool {
        self.cache
            .peek()
            .is_none_or(|conn| conn.endpoint_states().is_terminated())
    }

    /// Keeps the current connection cached while its owner shuts down.
    pub fn set_owner_disposed(&self) {
        self.cache.set_owner_disposed();
    }

    /// Closes the connection and stops recovering it. Idempotent.
    pub fn dispose(&self) -> bool {
        self.cache.dispose()
    }

    /// Whether the cache was disposed.
    pub fn is_disposed(&self) -> bool {
        self.cache.is_disposed()
    }

    /// Identity of the cached connection.
    pub fn context(&self) -> &ResourceContext {
        &self.context
    }
}
