//! Registry lifecycle under broker shutdown and reconnection.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;
use ticket_relay_core::broker::BrokerClient;
use ticket_relay_mq::config::RegistryConfig;
use ticket_relay_mq::ChannelRegistry;
use ticket_relay_testing::MockBroker;

fn registry_with(broker: &Arc<MockBroker>) -> ChannelRegistry {
    let client: Arc<dyn BrokerClient> = Arc::clone(broker) as Arc<dyn BrokerClient>;
    ChannelRegistry::new(
        client,
        RegistryConfig::default().with_reconnect_backoff(Duration::from_millis(10)),
    )
}

#[tokio::test]
async fn shutdown_invalidates_every_issued_channel() {
    let broker = Arc::new(MockBroker::new());
    let registry = registry_with(&broker);

    let ids = [
        registry.allocate_id().await,
        registry.allocate_id().await,
        registry.allocate_id().await,
    ];
    let mut before = Vec::new();
    for id in ids {
        before.push(registry.get_channel(id).await.unwrap());
    }
    assert_eq!(broker.connect_count(), 1);

    broker.fire_shutdown("heartbeat missed").await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Every id gets a fresh channel on a rebuilt connection, and the old
    // handles were closed by the sweep.
    for (id, old) in ids.iter().zip(&before) {
        let fresh = registry.get_channel(*id).await.unwrap();
        assert!(!Arc::ptr_eq(old, &fresh));
    }
    for old in &before {
        assert!(old.is_closed());
    }
    // One rebuild serves all three ids: initial + probe + replacement.
    assert_eq!(broker.connect_count(), 3);
}

#[tokio::test]
async fn concurrent_callers_converge_on_one_channel_per_id() {
    let broker = Arc::new(MockBroker::new());
    let registry = Arc::new(registry_with(&broker));
    let id = registry.allocate_id().await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry.get_channel(id).await.unwrap()
        }));
    }

    let mut channels = Vec::new();
    for handle in handles {
        channels.push(handle.await.unwrap());
    }
    for channel in &channels[1..] {
        assert!(Arc::ptr_eq(&channels[0], channel));
    }
    assert_eq!(broker.connect_count(), 1);
}

#[tokio::test]
async fn repeated_shutdowns_recover_each_time() {
    let broker = Arc::new(MockBroker::new());
    let registry = registry_with(&broker);
    let id = registry.allocate_id().await;

    for round in 0..3 {
        let channel = registry.get_channel(id).await.unwrap();
        assert!(!channel.is_closed(), "round {round}");
        broker.fire_shutdown("flap").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    assert!(registry.get_channel(id).await.is_ok());
}

#[tokio::test]
async fn shutdown_fired_right_after_connect_is_not_lost() {
    let broker = Arc::new(MockBroker::new());
    let registry = registry_with(&broker);
    let id = registry.allocate_id().await;

    // Fire the shutdown immediately, with no settling delay: however the
    // event delivery interleaves with the connect bookkeeping, the registry
    // must converge on a fresh channel instead of reporting a closed
    // connection forever.
    let before = registry.get_channel(id).await.unwrap();
    broker.fire_shutdown("connection reset").await;

    let mut fresh = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let Ok(channel) = registry.get_channel(id).await {
            if !Arc::ptr_eq(&before, &channel) {
                fresh = Some(channel);
                break;
            }
        }
    }
    assert!(fresh.is_some(), "registry never recovered from the shutdown");
}

#[tokio::test]
async fn blocked_events_do_not_invalidate_channels() {
    let broker = Arc::new(MockBroker::new());
    let registry = registry_with(&broker);
    let id = registry.allocate_id().await;

    let before = registry.get_channel(id).await.unwrap();
    broker.fire_blocked("resource alarm").await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let after = registry.get_channel(id).await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(broker.connect_count(), 1);
}
