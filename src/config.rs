//! # Recovery configuration.
//!
//! [`RecoveryConfig`] bundles the retry options shared by every cache of a
//! client and the capacity of the event bus.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use amqp_recovery::{RecoveryConfig, RetryMode};
//!
//! let mut cfg = RecoveryConfig::default();
//! cfg.retry.mode = RetryMode::Fixed;
//! cfg.retry.delay = Duration::from_millis(250);
//! cfg.bus_capacity = 256;
//!
//! assert!(cfg.validate().is_ok());
//! assert_eq!(cfg.retry_policy().max_retries(), 3);
//! ```

use std::sync::Arc;

use crate::error::ConfigError;
use crate::policies::{AmqpRetryPolicy, RetryOptions, RetryPolicy};

/// Configuration shared by a client's connection, session and channel caches.
#[derive(Clone, Debug)]
pub struct RecoveryConfig {
    /// Retry behavior of every population cycle.
    pub retry: RetryOptions,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for RecoveryConfig {
    /// - `retry = RetryOptions::default()`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            bus_capacity: 1024,
        }
    }
}

impl RecoveryConfig {
    /// Returns the bus capacity, clamped to at least 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Builds the retry policy described by [`RecoveryConfig::retry`].
    pub fn retry_policy(&self) -> Arc<dyn RetryPolicy> {
        Arc::new(AmqpRetryPolicy::new(self.retry.clone()))
    }

    /// Checks the retry options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()
    }
}
