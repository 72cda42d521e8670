//! Error types used by the recovery caches and the resources they manage.
//!
//! - [`AmqpError`]: everything a population cycle can fail with.
//! - [`ErrorCondition`]: AMQP error condition symbols reported by a broker/engine.
//! - [`ConfigError`]: retry options no policy can work with.
//!
//! Errors travel as [`SharedError`] (`Arc<AmqpError>`): a failed cycle hands the
//! **same** allocation to every waiter, so callers may compare with [`Arc::ptr_eq`].
//!
//! [`AmqpError::as_label`] and [`AmqpError::as_message`] feed logs/metrics;
//! [`AmqpError::is_transient`] drives retry classification.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Shared handle to an [`AmqpError`].
pub type SharedError = Arc<AmqpError>;

/// # AMQP error condition symbols.
///
/// Covers the conditions defined by the AMQP 1.0 core specification plus the
/// service-specific ones brokers commonly send. Unknown symbols are kept verbatim
/// in [`ErrorCondition::Other`].
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCondition {
    /// `amqp:internal-error`
    InternalError,
    /// `amqp:not-found`
    NotFound,
    /// `amqp:unauthorized-access`
    UnauthorizedAccess,
    /// `amqp:resource-limit-exceeded`
    ResourceLimitExceeded,
    /// `amqp:not-allowed`
    NotAllowed,
    /// `amqp:connection:forced`
    ConnectionForced,
    /// `amqp:connection:framing-error`
    FramingError,
    /// `amqp:link:detach-forced`
    LinkDetachForced,
    /// `amqp:link:stolen`
    LinkStolen,
    /// `com.microsoft:server-busy`
    ServerBusy,
    /// `com.microsoft:timeout`
    Timeout,
    /// `com.microsoft:entity-disabled`
    EntityDisabled,
    /// Any other condition symbol.
    Other(String),
}

impl ErrorCondition {
    /// Parses a condition symbol as received on the wire.
    ///
    /// # Example
    /// ```
    /// use amqp_recovery::ErrorCondition;
    ///
    /// assert_eq!(ErrorCondition::from_symbol("com.microsoft:server-busy"), ErrorCondition::ServerBusy);
    /// assert_eq!(
    ///     ErrorCondition::from_symbol("vendor:custom"),
    ///     ErrorCondition::Other("vendor:custom".into())
    /// );
    /// ```
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "amqp:internal-error" => Self::InternalError,
            "amqp:not-found" => Self::NotFound,
            "amqp:unauthorized-access" => Self::UnauthorizedAccess,
            "amqp:resource-limit-exceeded" => Self::ResourceLimitExceeded,
            "amqp:not-allowed" => Self::NotAllowed,
            "amqp:connection:forced" => Self::ConnectionForced,
            "amqp:connection:framing-error" => Self::FramingError,
            "amqp:link:detach-forced" => Self::LinkDetachForced,
            "amqp:link:stolen" => Self::LinkStolen,
            "com.microsoft:server-busy" => Self::ServerBusy,
            "com.microsoft:timeout" => Self::Timeout,
            "com.microsoft:entity-disabled" => Self::EntityDisabled,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the wire symbol of this condition.
    pub fn as_symbol(&self) -> &str {
        match self {
            Self::InternalError => "amqp:internal-error",
            Self::NotFound => "amqp:not-found",
            Self::UnauthorizedAccess => "amqp:unauthorized-access",
            Self::ResourceLimitExceeded => "amqp:resource-limit-exceeded",
            Self::NotAllowed => "amqp:not-allowed",
            Self::ConnectionForced => "amqp:connection:forced",
            Self::FramingError => "amqp:connection:framing-error",
            Self::LinkDetachForced => "amqp:link:detach-forced",
            Self::LinkStolen => "amqp:link:stolen",
            Self::ServerBusy => "com.microsoft:server-busy",
            Self::Timeout => "com.microsoft:timeout",
            Self::EntityDisabled => "com.microsoft:entity-disabled",
            Self::Other(symbol) => symbol,
        }
    }

    /// Whether the condition describes a passing state of the broker or transport.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::InternalError
                | Self::ConnectionForced
                | Self::FramingError
                | Self::LinkDetachForced
                | Self::ServerBusy
                | Self::Timeout
        )
    }
}

impl fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

/// # Errors produced while establishing or caching an AMQP resource.
///
/// Transient variants (`Timeout`, `Closed`, `Io`, `DispatcherRejected`, and
/// `Endpoint` with a transient condition) are retried by
/// [`AmqpRetryPolicy`](crate::AmqpRetryPolicy); everything else ends a population cycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AmqpError {
    /// The resource did not reach `Active` within the try-timeout.
    #[error("timeout waiting for {what} to become active after {timeout:?}")]
    Timeout {
        /// Description of the resource.
        what: String,
        /// The try-timeout that elapsed.
        timeout: Duration,
    },

    /// The endpoint was closed with an AMQP error condition.
    #[error("{condition}: {description}")]
    Endpoint {
        /// Condition reported by the remote peer or engine.
        condition: ErrorCondition,
        /// Free-form description attached to the condition.
        description: String,
    },

    /// The endpoint completed before it was ever active.
    #[error("{what} closed before becoming active")]
    Closed {
        /// Description of the resource.
        what: String,
    },

    /// Transport level failure.
    #[error("i/o error: {message}")]
    Io {
        /// Underlying error message.
        message: String,
    },

    /// The reactor refused to schedule work.
    #[error("dispatcher rejected work: {message}")]
    DispatcherRejected {
        /// Underlying error message.
        message: String,
    },

    /// The cache was disposed; no resource will ever be produced again.
    #[error("{message}")]
    Terminated {
        /// Message identifying the terminated cache.
        message: String,
    },

    /// The factory could not construct a new instance.
    #[error("failed to create {what}: {reason}")]
    Factory {
        /// Description of the resource.
        what: String,
        /// Reason given by the factory.
        reason: String,
    },

    /// The population task ended abnormally.
    #[error("population of {what} aborted")]
    Aborted {
        /// Description of the resource.
        what: String,
    },
}

impl AmqpError {
    /// Shorthand for an [`AmqpError::Endpoint`] error.
    pub fn endpoint(condition: ErrorCondition, description: impl Into<String>) -> Self {
        Self::Endpoint {
            condition,
            description: description.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use amqp_recovery::AmqpError;
    ///
    /// let err = AmqpError::Terminated { message: "gone".into() };
    /// assert_eq!(err.as_label(), "cache_terminated");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "activation_timeout",
            Self::Endpoint { .. } => "endpoint_error",
            Self::Closed { .. } => "closed_before_active",
            Self::Io { .. } => "io_error",
            Self::DispatcherRejected { .. } => "dispatcher_rejected",
            Self::Terminated { .. } => "cache_terminated",
            Self::Factory { .. } => "factory_failed",
            Self::Aborted { .. } => "population_aborted",
        }
    }

    /// Returns a compact message without the resource description, for log lines
    /// that already carry the resource.
    pub fn as_message(&self) -> String {
        match self {
            Self::Timeout { timeout, .. } => format!("timeout: {timeout:?}"),
            Self::Endpoint {
                condition,
                description,
            } => format!("{condition}: {description}"),
            Self::Closed { .. } => "closed before active".to_string(),
            Self::Io { message } => format!("i/o: {message}"),
            Self::DispatcherRejected { message } => format!("dispatcher rejected: {message}"),
            Self::Terminated { message } => message.clone(),
            Self::Factory { reason, .. } => format!("factory: {reason}"),
            Self::Aborted { .. } => "aborted".to_string(),
        }
    }

    /// Returns the endpoint condition, if any.
    pub fn condition(&self) -> Option<&ErrorCondition> {
        match self {
            Self::Endpoint { condition, .. } => Some(condition),
            _ => None,
        }
    }

    /// Indicates whether retrying might succeed without any external change.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use amqp_recovery::{AmqpError, ErrorCondition};
    ///
    /// let busy = AmqpError::endpoint(ErrorCondition::ServerBusy, "slow down");
    /// assert!(busy.is_transient());
    ///
    /// let denied = AmqpError::endpoint(ErrorCondition::UnauthorizedAccess, "bad token");
    /// assert!(!denied.is_transient());
    /// ```
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::Closed { .. }
            | Self::Io { .. }
            | Self::DispatcherRejected { .. } => true,
            Self::Endpoint { condition, .. } => condition.is_transient(),
            Self::Terminated { .. } | Self::Factory { .. } | Self::Aborted { .. } => false,
        }
    }

    /// Whether this is the disposal error of a terminated cache.
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }
}

/// Rejected retry configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Every activation wait would time out immediately.
    #[error("try_timeout must be greater than zero")]
    ZeroTryTimeout,

    /// The first delay is already above the cap.
    #[error("delay ({delay:?}) must not exceed max_delay ({max_delay:?})")]
    DelayAboveMax {
        /// Configured first delay.
        delay: Duration,
        /// Configured cap.
        max_delay: Duration,
    },
}
