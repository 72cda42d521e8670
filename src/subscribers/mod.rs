//! # Event subscribers.
//!
//! ```text
//! caches ── publish(Event) ──► Bus ──► Monitor ──► SubscriberSet
//!                                                   ├──► LogWriter (tracing)
//!                                                   └──► custom Subscribe impls
//! ```
//!
//! - [`Subscribe`] the extension trait
//! - [`SubscriberSet`] per-subscriber queues, workers, panic isolation
//! - [`LogWriter`] built-in `tracing` writer (feature `logging`)

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
