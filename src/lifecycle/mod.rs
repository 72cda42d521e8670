//! Endpoint lifecycle states and their observable signals.
//!
//! ## Contents
//! - [`LifecycleState`] `Uninitialized → Active → {Completed | Errored}`
//! - [`LifecycleHandle`] / [`LifecycleSignal`] publisher and observer pair from [`channel`]
//! - [`LifecycleSignal::all`] composite of several signals (request-response channels)

mod composite;
mod signal;
mod state;

pub use signal::{LifecycleHandle, LifecycleSignal, channel};
pub use state::LifecycleState;
