//! Mock auth API for testing.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use crate::api::{AccessToken, AuthApi, BoxFuture};
use crate::error::{AuthError, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Mock auth API.
///
/// In-memory token endpoint with a configurable token value, lifetime,
/// scripted failures, and an optional artificial fetch delay for widening
/// single-flight race windows in tests.
pub struct MockAuthApi {
    token: Mutex<String>,
    expires_in: AtomicU64,
    fetch_count: AtomicUsize,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    last_request: Mutex<Option<(String, String, String)>>,
}

impl MockAuthApi {
    /// Create a mock that hands out the given token with a 3600s lifetime.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(token.into()),
            expires_in: AtomicU64::new(3600),
            fetch_count: AtomicUsize::new(0),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            last_request: Mutex::new(None),
        }
    }

    /// Change the token value handed out by subsequent fetches.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.lock().unwrap() = token.into();
    }

    /// Change the server-reported lifetime, in seconds.
    pub fn set_expires_in(&self, seconds: u64) {
        self.expires_in.store(seconds, Ordering::SeqCst);
    }

    /// Delay every fetch by the given duration.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Fail every fetch with the given reason until cleared.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock().unwrap() = Some(reason.into());
    }

    /// Stop failing fetches.
    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Number of fetches performed (failed ones included).
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// The `(secret, username, password)` of the most recent fetch.
    #[must_use]
    pub fn last_request(&self) -> Option<(String, String, String)> {
        self.last_request.lock().unwrap().clone()
    }
}

impl AuthApi for MockAuthApi {
    fn post_token<'a>(
        &'a self,
        secret: &'a str,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<AccessToken>> {
        Box::pin(async move {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some((
                secret.to_string(),
                username.to_string(),
                password.to_string(),
            ));

            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(reason) = self.failure.lock().unwrap().clone() {
                return Err(AuthError::FetchFailed {
                    status: Some(503),
                    reason,
                });
            }

            Ok(AccessToken {
                access_token: self.token.lock().unwrap().clone(),
                expires_in: self.expires_in.load(Ordering::SeqCst),
            })
        })
    }
}
