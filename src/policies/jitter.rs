//! # Jitter applied to retry delays.
//!
//! Many clients losing the same broker at the same moment would otherwise
//! reconnect in lockstep. [`JitterPolicy`] spreads them out.
//!
//! - [`JitterPolicy::None`]: exact delay.
//! - [`JitterPolicy::Full`]: random in `[0, delay]`.
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`.

use std::time::Duration;

use rand::Rng;

/// Randomization strategy for backoff delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the computed delay as is.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]`; keeps about 75% of the delay on average.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let extra = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + extra)
            }
        }
    }
}
