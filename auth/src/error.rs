//! Error types for authentication operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while resolving or fetching tokens.
///
/// Remote fetch failures are propagated unmodified to the caller: no retry
/// happens inside the cache, since a failed token fetch blocks all outbound
/// authenticated calls and the retry policy belongs to the caller.
#[derive(Debug, Error, Clone)]
pub enum AuthError {
    /// A required credential could not be resolved from arguments or
    /// configured defaults. Fails fast at call time.
    #[error("Missing credential: {0}")]
    MissingCredentials(&'static str),

    /// The token endpoint rejected the request or was unreachable.
    #[error("Token fetch failed (status {status:?}): {reason}")]
    FetchFailed {
        /// HTTP status, when the request reached the server
        status: Option<u16>,
        /// Error detail
        reason: String,
    },

    /// The token endpoint returned a body that could not be parsed.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// Returns `true` if the failure is a caller-side configuration error.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ticket_relay_auth::AuthError;
    /// assert!(AuthError::MissingCredentials("secret").is_configuration_error());
    /// ```
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::MissingCredentials(_))
    }
}
