//! Authentication configuration.
//!
//! Values should be provided by the application, not hardcoded. The
//! configured username/password are defaults; per-call arguments override
//! them.

use std::time::Duration;

/// Token cache configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Client secret presented to the token endpoint.
    pub secret: Option<String>,

    /// Default username, used when a call does not supply one.
    pub default_username: Option<String>,

    /// Default password, used when a call does not supply one.
    pub default_password: Option<String>,

    /// Safety margin subtracted from the server-reported expiry.
    ///
    /// A cached token is treated as expired this long before the server
    /// says it is, so a token handed out never expires mid-flight.
    ///
    /// Default: 30 seconds
    pub expiry_margin: Duration,
}

impl AuthConfig {
    /// Create a configuration with the given client secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            default_username: None,
            default_password: None,
            expiry_margin: Duration::from_secs(30),
        }
    }

    /// Set default credentials for calls that do not supply their own.
    #[must_use]
    pub fn with_default_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.default_username = Some(username.into());
        self.default_password = Some(password.into());
        self
    }

    /// Set the expiry safety margin.
    #[must_use]
    pub const fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = margin;
        self
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            default_username: None,
            default_password: None,
            expiry_margin: Duration::from_secs(30),
        }
    }
}
