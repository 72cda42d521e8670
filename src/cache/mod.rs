//! Recoverable resource caches.
//!
//! ## Contents
//! - [`RecoverableCache`] one resource, single-flight population with retries
//! - [`KeyedRecoverableCache`] independent slots per key (sessions by name)
//! - [`CacheBuilder`] construction of a [`RecoverableCache`]
//! - [`Recoverable`], [`ResourceFactory`], [`KeyedResourceFactory`], [`FactoryFn`]
//!   what a cache needs from the resources it manages
//!
//! ## Internals
//! - `cycle` the population loop (create, activate, back off)
//! - `activation` one bounded wait for `Active`
//! - `reporter` stamps and publishes events

mod activation;
mod builder;
mod cycle;
mod factory;
mod keyed;
mod recoverable;
mod reporter;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::CacheBuilder;
pub use factory::{FactoryFn, KeyedResourceFactory, Recoverable, ResourceFactory};
pub use keyed::KeyedRecoverableCache;
pub use recoverable::RecoverableCache;
