//! # Ticket Relay Auth
//!
//! Short-lived bearer token cache used to authenticate outbound REST calls
//! against the remote trading platform.
//!
//! The cache is keyed by `(secret, username, password)` and protects the
//! token endpoint against a thundering herd: a single-admission semaphore
//! guarantees that at most one refresh is in flight for the whole cache
//! (**single-flight**), and concurrent callers share its result. Cached
//! tokens expire a fixed safety margin before the server-reported expiry so
//! a token handed out here never expires mid-flight.
//!
//! ## Example
//!
//! ```ignore
//! use ticket_relay_auth::{AuthConfig, RestAuthClient, TokenCache};
//!
//! let config = AuthConfig::new("client-secret")
//!     .with_default_credentials("operator", "s3cret");
//! let api = Arc::new(RestAuthClient::new("https://auth.example.com/token"));
//! let cache = TokenCache::new(api, config);
//!
//! // First call fetches, later calls hit the cache until the margin.
//! let token = cache.get_token(None, None).await?;
//! ```

/// Auth API collaborator trait and reqwest implementation
pub mod api;

/// Configuration
pub mod config;

/// Error types
pub mod error;

/// Single-flight token cache
pub mod token_cache;

/// Mock providers for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use api::{AccessToken, AuthApi, RestAuthClient};
pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use token_cache::TokenCache;
