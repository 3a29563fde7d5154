//! Single-flight token cache.
//!
//! Avoids redundant authentication round-trips and a thundering herd of
//! concurrent refreshes. Cache hits never block; a refresh acquires a
//! single-admission semaphore scoped to the whole cache (a deliberate
//! simplification over per-key locking, acceptable at the expected key
//! cardinality) and re-checks the cache before fetching, so N concurrent
//! callers with the same credentials trigger exactly one remote fetch.

use crate::api::AuthApi;
use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};

/// One cached token.
#[derive(Debug, Clone)]
struct TokenEntry {
    value: String,
    expires_at: Instant,
}

/// Cached single-flight fetch of bearer tokens, keyed by credentials.
pub struct TokenCache {
    api: Arc<dyn AuthApi>,
    config: AuthConfig,
    entries: RwLock<HashMap<String, TokenEntry>>,
    /// Single-admission: at most one refresh in flight for the whole cache.
    refresh: Semaphore,
}

impl TokenCache {
    /// Create a cache over the given auth API.
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, config: AuthConfig) -> Self {
        Self {
            api,
            config,
            entries: RwLock::new(HashMap::new()),
            refresh: Semaphore::new(1),
        }
    }

    /// Return a valid bearer token for the given credentials.
    ///
    /// Arguments override the configured defaults. The returned token is
    /// guaranteed to live at least the configured expiry margin less than
    /// the server-reported lifetime.
    ///
    /// # Errors
    ///
    /// Fails fast with [`AuthError::MissingCredentials`] when the secret,
    /// username, or password cannot be resolved; fetch failures are logged
    /// and propagated unmodified.
    pub async fn get_token(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<String> {
        let secret = self
            .config
            .secret
            .as_deref()
            .ok_or(AuthError::MissingCredentials("secret"))?;
        let username = username
            .or(self.config.default_username.as_deref())
            .ok_or(AuthError::MissingCredentials("username"))?;
        let password = password
            .or(self.config.default_password.as_deref())
            .ok_or(AuthError::MissingCredentials("password"))?;

        let key = format!("{secret}:{username}:{password}");

        // Fast path: cached hits never block on the refresh semaphore.
        if let Some(value) = self.lookup(&key).await {
            return Ok(value);
        }

        // Slow path: one refresh at a time; the permit is released on all
        // paths when it drops.
        let _permit = self
            .refresh
            .acquire()
            .await
            .map_err(|_| AuthError::FetchFailed {
                status: None,
                reason: "token cache is shut down".to_string(),
            })?;

        // A concurrent caller may have refreshed while we waited.
        if let Some(value) = self.lookup(&key).await {
            return Ok(value);
        }

        let token = self
            .api
            .post_token(secret, username, password)
            .await
            .map_err(|e| {
                tracing::error!(username, error = %e, "token fetch failed");
                e
            })?;

        let lifetime = Duration::from_secs(token.expires_in)
            .saturating_sub(self.config.expiry_margin);
        let entry = TokenEntry {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        };
        tracing::debug!(
            username,
            lifetime_s = lifetime.as_secs(),
            "token cached"
        );
        self.entries.write().await.insert(key, entry);
        Ok(token.access_token)
    }

    /// Drop every cached token.
    ///
    /// Used when the platform invalidates tokens out of band.
    pub async fn invalidate(&self) {
        self.entries.write().await.clear();
        tracing::info!("token cache invalidated");
    }

    async fn lookup(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }
}
