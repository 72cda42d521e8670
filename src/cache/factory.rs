//! # Resources and the factories that create them.
//!
//! - [`Recoverable`]: what the cache needs from a protocol resource: its
//!   lifecycle signal and a way to release it.
//! - [`ResourceFactory`]: synchronous, cheap constructor of a not-yet-active
//!   instance. Activation is observed afterwards through the signal.
//! - [`KeyedResourceFactory`]: the same, parameterized by a key (session name).
//! - [`FactoryFn`]: closure-backed implementation of both.
//!
//! A factory error is returned to every waiter as is and never retried:
//! construction is local, so failing again without an external change is the
//! expected outcome.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use amqp_recovery::{AmqpError, FactoryFn, LifecycleHandle, LifecycleSignal, Recoverable, ResourceFactory, lifecycle};
//!
//! struct Link {
//!     handle: LifecycleHandle,
//!     states: LifecycleSignal,
//! }
//!
//! impl Recoverable for Link {
//!     fn endpoint_states(&self) -> LifecycleSignal { self.states.clone() }
//!     fn close(&self) { self.handle.complete(); }
//! }
//!
//! let factory = FactoryFn::new(|| {
//!     let (handle, states) = lifecycle::channel();
//!     Ok::<_, AmqpError>(Arc::new(Link { handle, states }))
//! });
//! let link = factory.create().unwrap();
//! assert!(!link.endpoint_states().is_terminated());
//! ```

use std::sync::Arc;

use crate::error::AmqpError;
use crate::lifecycle::LifecycleSignal;

/// A protocol resource that can be cached and recovered.
pub trait Recoverable: Send + Sync + 'static {
    /// The resource's lifecycle signal.
    fn endpoint_states(&self) -> LifecycleSignal;

    /// Releases the resource. Must not block and must be idempotent.
    fn close(&self);
}

impl<R: Recoverable + ?Sized> Recoverable for Arc<R> {
    fn endpoint_states(&self) -> LifecycleSignal {
        (**self).endpoint_states()
    }

    fn close(&self) {
        (**self).close()
    }
}

/// Creates new, not-yet-active instances of `T`.
pub trait ResourceFactory<T>: Send + Sync + 'static {
    /// Creates one instance.
    ///
    /// Runs with the owning cache's state locked; it must not call back into
    /// that cache.
    fn create(&self) -> Result<T, AmqpError>;
}

/// Creates new instances of `T` for a key.
pub trait KeyedResourceFactory<K, T>: Send + Sync + 'static {
    /// Creates one instance for `key`.
    fn create(&self, key: &K) -> Result<T, AmqpError>;
}

/// Closure-backed factory.
///
/// `Fn() -> Result<T, AmqpError>` makes a [`ResourceFactory`],
/// `Fn(&K) -> Result<T, AmqpError>` makes a [`KeyedResourceFactory`].
#[derive(Debug)]
pub struct FactoryFn<F> {
    f: F,
}

impl<F> FactoryFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<T, F> ResourceFactory<T> for FactoryFn<F>
where
    F: Fn() -> Result<T, AmqpError> + Send + Sync + 'static,
{
    fn create(&self) -> Result<T, AmqpError> {
        (self.f)()
    }
}

impl<K, T, F> KeyedResourceFactory<K, T> for FactoryFn<F>
where
    F: Fn(&K) -> Result<T, AmqpError> + Send + Sync + 'static,
{
    fn create(&self, key: &K) -> Result<T, AmqpError> {
        (self.f)(key)
    }
}

impl<T, R: ResourceFactory<T> + ?Sized> ResourceFactory<T> for Arc<R> {
    fn create(&self) -> Result<T, AmqpError> {
        (**self).create()
    }
}

/// Binds a keyed factory to one key.
pub(crate) struct KeyBound<K, T> {
    key: K,
    factory: Arc<dyn KeyedResourceFactory<K, T>>,
}

impl<K, T> KeyBound<K, T> {
    pub(crate) fn new(key: K, factory: Arc<dyn KeyedResourceFactory<K, T>>) -> Self {
        Self { key, factory }
    }
}

impl<K, T> ResourceFactory<T> for KeyBound<K, T>
where
    K: Send + Sync + 'static,
    T: 'static,
{
    fn create(&self) -> Result<T, AmqpError> {
        KeyedResourceFactory::create(&*self.factory, &self.key)
    }
}
