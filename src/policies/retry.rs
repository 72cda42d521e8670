//! # Retry policy consulted by population cycles.
//!
//! A [`RetryPolicy`] answers one question per failed activation attempt:
//! *retry, and after how long?* Returning `None` ends the cycle with the error.
//!
//! ```text
//! attempt failed with `err`
//!   └─► policy.calculate_retry_delay(&err, min(attempt, policy.max_retries()))
//!         ├─ Some(delay) ─► close instance, sleep(delay), next attempt
//!         └─ None        ─► cycle fails with `err`
//! ```
//!
//! ## `max_retries` is not a budget
//! The attempt index passed in is capped at [`RetryPolicy::max_retries`], which
//! only stops the backoff curve from growing. A transient error is retried no
//! matter how many times it has happened already; only a non-transient error
//! (or disposal) ends a cycle.

use std::time::Duration;

use crate::error::{AmqpError, ConfigError, ErrorCondition};
use crate::policies::backoff::BackoffPolicy;
use crate::policies::jitter::JitterPolicy;

/// Extra wait added when the broker answered `com.microsoft:server-busy`.
pub const SERVER_BUSY_BASE_DELAY: Duration = Duration::from_secs(4);

/// Shape of the delay curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetryMode {
    /// Same delay for every attempt.
    Fixed,
    /// Delay doubles per attempt up to `max_delay`.
    #[default]
    Exponential,
}

/// User-facing retry settings.
///
/// ## Field semantics
/// - `max_retries`: cap on the attempt index used for delay growth
/// - `delay`: delay for the first retry
/// - `max_delay`: upper bound for any computed delay
/// - `try_timeout`: per-attempt bound on waiting for a resource to become active
/// - `mode`: [`RetryMode::Fixed`] or [`RetryMode::Exponential`]
/// - `jitter`: randomization applied to each delay
#[derive(Clone, Debug)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub delay: Duration,
    pub max_delay: Duration,
    pub try_timeout: Duration,
    pub mode: RetryMode,
    pub jitter: JitterPolicy,
}

impl Default for RetryOptions {
    /// `max_retries = 3`, `delay = 800ms`, `max_delay = 60s`, `try_timeout = 60s`,
    /// exponential mode with equal jitter.
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(60),
            try_timeout: Duration::from_secs(60),
            mode: RetryMode::Exponential,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl RetryOptions {
    /// Checks the options for values no policy can work with.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use amqp_recovery::{ConfigError, RetryOptions};
    ///
    /// let mut opts = RetryOptions::default();
    /// assert!(opts.validate().is_ok());
    ///
    /// opts.try_timeout = Duration::ZERO;
    /// assert_eq!(opts.validate(), Err(ConfigError::ZeroTryTimeout));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.try_timeout.is_zero() {
            return Err(ConfigError::ZeroTryTimeout);
        }
        if self.delay > self.max_delay {
            return Err(ConfigError::DelayAboveMax {
                delay: self.delay,
                max_delay: self.max_delay,
            });
        }
        Ok(())
    }

    /// Builds the backoff curve described by these options.
    pub fn backoff(&self) -> BackoffPolicy {
        match self.mode {
            RetryMode::Fixed => BackoffPolicy::fixed(self.delay, self.max_delay, self.jitter),
            RetryMode::Exponential => {
                BackoffPolicy::exponential(self.delay, self.max_delay, self.jitter)
            }
        }
    }
}

/// Decides whether and when a failed activation is retried.
pub trait RetryPolicy: Send + Sync + 'static {
    /// Returns the delay before the next attempt, or `None` if `error` is not retriable.
    ///
    /// `attempt` is already capped at [`RetryPolicy::max_retries`].
    fn calculate_retry_delay(&self, error: &AmqpError, attempt: u32) -> Option<Duration>;

    /// Cap for the attempt index handed to [`RetryPolicy::calculate_retry_delay`].
    fn max_retries(&self) -> u32;

    /// Per-attempt bound on waiting for `Active`.
    fn try_timeout(&self) -> Duration;
}

/// Policy used by all built-in caches.
///
/// Retries every error for which [`AmqpError::is_transient`] holds, using the
/// backoff curve of its [`RetryOptions`]. A server-busy rejection waits an extra
/// [`SERVER_BUSY_BASE_DELAY`].
#[derive(Clone, Debug)]
pub struct AmqpRetryPolicy {
    options: RetryOptions,
    backoff: BackoffPolicy,
}

impl AmqpRetryPolicy {
    /// Creates a policy from the given options.
    pub fn new(options: RetryOptions) -> Self {
        let backoff = options.backoff();
        Self { options, backoff }
    }

    /// The options this policy was built from.
    pub fn options(&self) -> &RetryOptions {
        &self.options
    }
}

impl Default for AmqpRetryPolicy {
    fn default() -> Self {
        Self::new(RetryOptions::default())
    }
}

impl RetryPolicy for AmqpRetryPolicy {
    fn calculate_retry_delay(&self, error: &AmqpError, attempt: u32) -> Option<Duration> {
        if !error.is_transient() {
            return None;
        }
        let delay = self.backoff.next(attempt);
        if matches!(error.condition(), Some(ErrorCondition::ServerBusy)) {
            Some(delay + SERVER_BUSY_BASE_DELAY)
        } else {
            Some(delay)
        }
    }

    fn max_retries(&self) -> u32 {
        self.options.max_retries
    }

    fn try_timeout(&self) -> Duration {
        self.options.try_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(mode: RetryMode) -> AmqpRetryPolicy {
        AmqpRetryPolicy::new(RetryOptions {
            max_retries: 4,
            delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            try_timeout: Duration::from_secs(1),
            mode,
            jitter: JitterPolicy::None,
        })
    }

    fn io() -> AmqpError {
        AmqpError::Io {
            message: "connection reset".into(),
        }
    }

    #[test]
    fn non_transient_is_not_retried() {
        let policy = exact(RetryMode::Exponential);
        let err = AmqpError::endpoint(ErrorCondition::UnauthorizedAccess, "expired token");
        assert_eq!(policy.calculate_retry_delay(&err, 0), None);
    }

    #[test]
    fn exponential_mode_grows() {
        let policy = exact(RetryMode::Exponential);
        assert_eq!(
            policy.calculate_retry_delay(&io(), 0),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            policy.calculate_retry_delay(&io(), 4),
            Some(Duration::from_millis(1600))
        );
    }

    #[test]
    fn fixed_mode_is_flat() {
        let policy = exact(RetryMode::Fixed);
        assert_eq!(
            policy.calculate_retry_delay(&io(), 0),
            policy.calculate_retry_delay(&io(), 4)
        );
    }

    #[test]
    fn retriable_far_beyond_max_retries() {
        let policy = exact(RetryMode::Exponential);
        assert!(policy.calculate_retry_delay(&io(), u32::MAX).is_some());
    }

    #[test]
    fn server_busy_adds_base_delay() {
        let policy = exact(RetryMode::Fixed);
        let busy = AmqpError::endpoint(ErrorCondition::ServerBusy, "throttled");
        assert_eq!(
            policy.calculate_retry_delay(&busy, 0),
            Some(Duration::from_millis(100) + SERVER_BUSY_BASE_DELAY)
        );
    }

    #[test]
    fn validate_rejects_delay_above_max() {
        let opts = RetryOptions {
            delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(1),
            ..RetryOptions::default()
        };
        assert_eq!(
            opts.validate(),
            Err(ConfigError::DelayAboveMax {
                delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(1),
            })
        );
    }
}
