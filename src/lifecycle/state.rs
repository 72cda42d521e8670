//! # Endpoint lifecycle states.
//!
//! ```text
//! Uninitialized ──► Active ──► Completed
//!       │             │
//!       │             └──────► Errored(cause)
//!       ├──────────────────────► Completed
//!       └──────────────────────► Errored(cause)
//! ```
//!
//! `Completed` and `Errored` are terminal. Two `Errored` states are equal only
//! when they carry the same cause allocation.

use std::fmt;
use std::sync::Arc;

use crate::error::SharedError;

/// Activation status of a protocol resource.
#[derive(Clone, Debug)]
pub enum LifecycleState {
    /// Created, not yet acknowledged by the peer.
    Uninitialized,
    /// Open and usable.
    Active,
    /// Closed without error.
    Completed,
    /// Closed with an error.
    Errored(SharedError),
}

impl LifecycleState {
    /// `true` for `Completed` and `Errored`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored(_))
    }

    /// `true` for `Active`.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// The error cause of an `Errored` state.
    pub fn cause(&self) -> Option<&SharedError> {
        match self {
            Self::Errored(cause) => Some(cause),
            _ => None,
        }
    }

    /// Short stable label for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Errored(_) => "errored",
        }
    }
}

impl PartialEq for LifecycleState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Uninitialized, Self::Uninitialized)
            | (Self::Active, Self::Active)
            | (Self::Completed, Self::Completed) => true,
            (Self::Errored(a), Self::Errored(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for LifecycleState {}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Errored(cause) => write!(f, "errored: {cause}"),
            other => f.write_str(other.as_label()),
        }
    }
}
