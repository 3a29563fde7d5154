//! Single-flight behavior of the token cache under concurrency.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;
use ticket_relay_auth::mocks::MockAuthApi;
use ticket_relay_auth::{AuthApi, AuthConfig, TokenCache};

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
    let api = Arc::new(MockAuthApi::new("shared-token"));
    // Widen the race window so every caller arrives while the first fetch
    // is still in flight.
    api.set_fetch_delay(Duration::from_millis(50));

    let cache = Arc::new(TokenCache::new(
        Arc::clone(&api) as Arc<dyn AuthApi>,
        AuthConfig::new("secret").with_default_credentials("u", "p"),
    ));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache.get_token(None, None).await.unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), "shared-token");
    }
    assert_eq!(api.fetch_count(), 1);
}

#[tokio::test]
async fn refresh_serializes_across_unrelated_credentials() {
    // The single global semaphore is a deliberate simplification: two
    // distinct credential sets still refresh one after the other, and each
    // performs exactly one fetch.
    let api = Arc::new(MockAuthApi::new("tok"));
    api.set_fetch_delay(Duration::from_millis(20));

    let cache = Arc::new(TokenCache::new(
        Arc::clone(&api) as Arc<dyn AuthApi>,
        AuthConfig::new("secret"),
    ));

    let a = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_token(Some("alice"), Some("pw")).await })
    };
    let b = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_token(Some("bob"), Some("pw")).await })
    };

    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());
    assert_eq!(api.fetch_count(), 2);
}

#[tokio::test]
async fn token_rotates_after_margin_expiry() {
    let api = Arc::new(MockAuthApi::new("first"));
    api.set_expires_in(1);

    let cache = TokenCache::new(
        Arc::clone(&api) as Arc<dyn AuthApi>,
        AuthConfig::new("secret")
            .with_default_credentials("u", "p")
            .with_expiry_margin(Duration::from_millis(900)),
    );

    assert_eq!(cache.get_token(None, None).await.unwrap(), "first");

    api.set_token("second");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.get_token(None, None).await.unwrap(), "second");
    assert_eq!(api.fetch_count(), 2);
}
