//! Auth API collaborator trait and its REST implementation.

use crate::error::{AuthError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`AuthApi`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A bearer token as reported by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// The bearer token value.
    pub access_token: String,

    /// Server-reported lifetime, in seconds.
    pub expires_in: u64,
}

/// The token endpoint collaborator.
///
/// # Dyn Compatibility
///
/// Returns an explicit boxed future so the API can be injected as
/// `Arc<dyn AuthApi>` into the token cache.
pub trait AuthApi: Send + Sync {
    /// Fetch a fresh token for the given credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::FetchFailed`] on transport or server errors
    /// and [`AuthError::InvalidResponse`] on unparsable bodies.
    fn post_token<'a>(
        &'a self,
        secret: &'a str,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<AccessToken>>;
}

/// reqwest-based [`AuthApi`] implementation.
///
/// Posts a password-grant form to the configured token endpoint.
#[derive(Debug, Clone)]
pub struct RestAuthClient {
    /// HTTP client for making requests.
    http_client: reqwest::Client,

    /// Token endpoint URL.
    token_url: String,
}

impl RestAuthClient {
    /// Create a client for the given token endpoint.
    #[must_use]
    pub fn new(token_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            token_url: token_url.into(),
        }
    }
}

impl AuthApi for RestAuthClient {
    fn post_token<'a>(
        &'a self,
        secret: &'a str,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<AccessToken>> {
        Box::pin(async move {
            let params = [
                ("grant_type", "password"),
                ("client_secret", secret),
                ("username", username),
                ("password", password),
            ];

            let response = self
                .http_client
                .post(&self.token_url)
                .form(&params)
                .send()
                .await
                .map_err(|e| AuthError::FetchFailed {
                    status: None,
                    reason: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::FetchFailed {
                    status: Some(status.as_u16()),
                    reason: body,
                });
            }

            response
                .json::<AccessToken>()
                .await
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))
        })
    }
}
