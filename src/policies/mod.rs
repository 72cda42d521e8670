//! Retry and backoff policies.
//!
//! ## Contents
//! - [`RetryPolicy`] retry/no-retry decision plus the delay for one failed attempt
//! - [`AmqpRetryPolicy`] the built-in policy (transient errors only)
//! - [`RetryOptions`] / [`RetryMode`] user-facing knobs
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization to avoid reconnect storms
//!
//! ## Quick wiring
//! ```text
//! RetryOptions ──► AmqpRetryPolicy { backoff: BackoffPolicy }
//!      └─► cache::cycle uses:
//!           - policy.try_timeout() to bound each activation wait
//!           - policy.calculate_retry_delay(err, min(attempt, max_retries))
//! ```

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::{AmqpRetryPolicy, RetryMode, RetryOptions, RetryPolicy, SERVER_BUSY_BASE_DELAY};
