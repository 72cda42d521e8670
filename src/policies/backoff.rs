//! # Backoff curve between activation attempts.
//!
//! [`BackoffPolicy`] maps an attempt index to a delay:
//! `first × factor^attempt`, clamped to `max`, then jittered.
//!
//! The attempt index handed in by a population cycle is already capped at
//! `RetryPolicy::max_retries()`, so the curve flattens out after that many
//! failures while the cycle itself keeps retrying.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use amqp_recovery::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(800),
//!     max: Duration::from_secs(60),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(800));
//! assert_eq!(backoff.next(2), Duration::from_millis(3200));
//! assert_eq!(backoff.next(20), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay curve parameters.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay for attempt index 0.
    pub first: Duration,
    /// Upper bound applied before jitter.
    pub max: Duration,
    /// Multiplicative growth per attempt (`1.0` = fixed delay).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 800ms`, `max = 60s`, `factor = 2.0`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(800),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A constant curve: every attempt waits `delay` (clamped to `max`).
    pub fn fixed(delay: Duration, max: Duration, jitter: JitterPolicy) -> Self {
        Self {
            first: delay,
            max,
            factor: 1.0,
            jitter,
        }
    }

    /// A doubling curve starting at `first`, capped at `max`.
    pub fn exponential(first: Duration, max: Duration, jitter: JitterPolicy) -> Self {
        Self {
            first,
            max,
            factor: 2.0,
            jitter,
        }
    }

    /// Computes the delay for the given attempt index (0-indexed).
    ///
    /// Non-finite or negative intermediate values clamp to [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.base(attempt))
    }

    /// The clamped delay before jitter.
    pub fn base(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(first_ms: u64, max_ms: u64) -> BackoffPolicy {
        BackoffPolicy::exponential(
            Duration::from_millis(first_ms),
            Duration::from_millis(max_ms),
            JitterPolicy::None,
        )
    }

    #[test]
    fn exponential_doubles_until_max() {
        let policy = exp(100, 1_000);
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(800));
        assert_eq!(policy.next(4), Duration::from_millis(1_000));
        assert_eq!(policy.next(40), Duration::from_millis(1_000));
    }

    #[test]
    fn fixed_is_constant() {
        let policy = BackoffPolicy::fixed(
            Duration::from_millis(250),
            Duration::from_secs(5),
            JitterPolicy::None,
        );
        for attempt in 0..16 {
            assert_eq!(policy.next(attempt), Duration::from_millis(250));
        }
    }

    #[test]
    fn first_above_max_is_clamped() {
        let policy = exp(10_000, 5_000);
        assert_eq!(policy.next(0), Duration::from_millis(5_000));
    }

    #[test]
    fn overflowing_exponent_clamps() {
        let policy = exp(100, 10_000);
        assert_eq!(policy.next(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn equal_jitter_stays_within_upper_half() {
        let policy = BackoffPolicy::exponential(
            Duration::from_millis(100),
            Duration::from_secs(30),
            JitterPolicy::Equal,
        );
        for attempt in 0..12 {
            let base = policy.base(attempt);
            let delay = policy.next(attempt);
            assert!(delay <= base, "attempt {attempt}: {delay:?} > {base:?}");
            assert!(
                delay >= base / 2 - Duration::from_millis(1),
                "attempt {attempt}: {delay:?} below half of {base:?}"
            );
        }
    }
}
