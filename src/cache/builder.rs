use std::sync::Arc;

use crate::{
    cache::{
        factory::{Recoverable, ResourceFactory},
        recoverable::RecoverableCache,
        reporter::Reporter,
    },
    error::{AmqpError, SharedError},
    events::Bus,
    policies::RetryPolicy,
};

/// Builder for a [`RecoverableCache`].
pub struct CacheBuilder<T> {
    resource: Arc<str>,
    factory: Arc<dyn ResourceFactory<T>>,
    policy: Arc<dyn RetryPolicy>,
    bus: Option<Bus>,
    terminated: Option<SharedError>,
}

impl<T: Recoverable + Clone> CacheBuilder<T> {
    /// Creates a builder for the resource described by `resource`.
    ///
    /// `resource` names the cache in events and error messages.
    pub fn new(
        resource: impl Into<Arc<str>>,
        factory: impl ResourceFactory<T>,
        policy: Arc<dyn RetryPolicy>,
    ) -> Self {
        Self {
            resource: resource.into(),
            factory: Arc::new(factory),
            policy,
            bus: None,
            terminated: None,
        }
    }

    /// Publishes cache events to `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Like [`CacheBuilder::with_bus`], for an optional bus.
    pub fn with_bus_opt(mut self, bus: Option<Bus>) -> Self {
        self.bus = bus;
        self
    }

    /// Message of the error returned by `get()` after disposal.
    pub fn with_terminated_message(mut self, message: impl Into<String>) -> Self {
        self.terminated = Some(Arc::new(AmqpError::Terminated {
            message: message.into(),
        }));
        self
    }

    /// Reuses an existing terminated error, so several caches share one allocation.
    pub(crate) fn with_terminated_error(mut self, err: SharedError) -> Self {
        self.terminated = Some(err);
        self
    }

    /// Builds the cache. Nothing is created until the first `get()`.
    pub fn build(self) -> RecoverableCache<T> {
        let terminated = self.terminated.unwrap_or_else(|| {
            Arc::new(AmqpError::Terminated {
                message: format!("{} recovery support is terminated.", self.resource),
            })
        });
        RecoverableCache::from_parts(
            Reporter::new(self.resource, self.bus),
            self.factory,
            self.policy,
            terminated,
        )
    }
}
