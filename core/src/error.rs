//! Error types for messaging operations.

use thiserror::Error;

/// Result type alias for messaging operations.
pub type Result<T> = std::result::Result<T, MqError>;

/// Errors that can occur in the connection, channel, and dispatch layers.
///
/// Transport-level publish failures are intentionally **not** part of the
/// `send_ticket` result: they are reported through
/// [`PublishFailure`](crate::events::PublishFailure) notifications so that
/// senders are not serialized by error handling. The variants here cover the
/// failures that do propagate as errors.
#[derive(Debug, Error, Clone)]
pub enum MqError {
    /// A usable broker connection could not be established or is closed.
    ///
    /// Fatal to the current publish attempt, not to the process: callers
    /// should treat this as "not ready yet, retry later".
    #[error("Connection failure: {0}")]
    ConnectFailure(String),

    /// A channel could not be materialized on an open connection.
    #[error("Channel failure: {0}")]
    ChannelFailure(String),

    /// Publishing to the broker failed at the transport level.
    ///
    /// Only surfaced directly by broker client implementations; the
    /// publisher converts it into a notification.
    #[error("Publish failed on routing key '{routing_key}': {reason}")]
    PublishFailure {
        /// Routing key of the failed publish
        routing_key: String,
        /// Transport error detail
        reason: String,
    },

    /// The ticket mapper could not serialize the ticket.
    #[error("Ticket mapping failed: {0}")]
    MappingFailed(String),

    /// A required dependency was not provided or not ready at construction.
    #[error("Missing dependency: {0}")]
    MissingDependency(&'static str),
}

impl MqError {
    /// Returns `true` if the caller may reasonably retry the operation later.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ticket_relay_core::MqError;
    /// assert!(MqError::ConnectFailure("broker down".into()).is_retryable());
    /// assert!(!MqError::MissingDependency("publisher").is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailure(_) | Self::ChannelFailure(_) | Self::PublishFailure { .. }
        )
    }
}
