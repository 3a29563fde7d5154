//! In-memory broker client mock.
//!
//! Implements the broker collaborator traits over shared in-memory state.
//! Messages published on any channel of any connection land in one shared
//! log, so tests can assert across reconnects.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use ticket_relay_core::broker::{
    BoxFuture, BrokerChannel, BrokerClient, BrokerConnection, ConnectionEvent, PublishProperties,
};
use ticket_relay_core::error::{MqError, Result};
use tokio::sync::broadcast;

/// A message captured by the mock broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Exchange the message was published to (empty for the default).
    pub exchange: String,

    /// Routing key of the publish.
    pub routing_key: String,

    /// Correlation id from the publish properties.
    pub correlation_id: String,

    /// Reply routing key from the publish properties.
    pub reply_to: String,

    /// Raw message bytes.
    pub body: Vec<u8>,
}

/// State shared between the broker, its connections, and their channels.
struct Shared {
    connect_count: AtomicUsize,
    /// Remaining scripted connect failures.
    connect_failures: AtomicUsize,
    /// `(routing_key, reason)`; publishes on that key fail until cleared.
    publish_failure: Mutex<Option<(String, String)>>,
    published: Mutex<Vec<PublishedMessage>>,
}

/// In-memory broker client.
///
/// Thread-safe and cheap to clone behind an `Arc`; all inspection helpers
/// observe the same shared state regardless of which connection produced
/// the activity.
pub struct MockBroker {
    shared: Arc<Shared>,
    current: Mutex<Option<Arc<MockConnection>>>,
}

impl MockBroker {
    /// Create a new mock broker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                connect_count: AtomicUsize::new(0),
                connect_failures: AtomicUsize::new(0),
                publish_failure: Mutex::new(None),
                published: Mutex::new(Vec::new()),
            }),
            current: Mutex::new(None),
        }
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.shared.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Fail every publish on the given routing key until cleared.
    pub fn fail_publishes_on(&self, routing_key: impl Into<String>, reason: impl Into<String>) {
        *self.shared.publish_failure.lock().unwrap() = Some((routing_key.into(), reason.into()));
    }

    /// Stop failing publishes.
    pub fn clear_publish_failure(&self) {
        *self.shared.publish_failure.lock().unwrap() = None;
    }

    /// Number of connect attempts (failed ones included).
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.shared.connect_count.load(Ordering::SeqCst)
    }

    /// All messages published so far, across connections.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.shared.published.lock().unwrap().clone()
    }

    /// Close the current connection and broadcast a shutdown event on it.
    pub async fn fire_shutdown(&self, reason: &str) {
        let connection = self.current.lock().unwrap().clone();
        if let Some(connection) = connection {
            connection.open.store(false, Ordering::SeqCst);
            let _ = connection.events_tx.send(ConnectionEvent::Shutdown {
                reason: reason.to_string(),
            });
        }
    }

    /// Broadcast a blocked event on the current connection.
    pub async fn fire_blocked(&self, reason: &str) {
        let connection = self.current.lock().unwrap().clone();
        if let Some(connection) = connection {
            let _ = connection.events_tx.send(ConnectionEvent::Blocked {
                reason: reason.to_string(),
            });
        }
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerClient for MockBroker {
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn BrokerConnection>>> {
        Box::pin(async move {
            self.shared.connect_count.fetch_add(1, Ordering::SeqCst);

            let remaining = self.shared.connect_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.shared
                    .connect_failures
                    .store(remaining - 1, Ordering::SeqCst);
                return Err(MqError::ConnectFailure("scripted connect failure".to_string()));
            }

            let (events_tx, _) = broadcast::channel(16);
            let connection = Arc::new(MockConnection {
                shared: Arc::clone(&self.shared),
                open: AtomicBool::new(true),
                events_tx,
            });
            *self.current.lock().unwrap() = Some(Arc::clone(&connection));
            Ok(connection as Arc<dyn BrokerConnection>)
        })
    }
}

/// One mock connection.
struct MockConnection {
    shared: Arc<Shared>,
    open: AtomicBool,
    events_tx: broadcast::Sender<ConnectionEvent>,
}

impl BrokerConnection for MockConnection {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn open_channel(&self) -> BoxFuture<'_, Result<Arc<dyn BrokerChannel>>> {
        Box::pin(async move {
            if !self.is_open() {
                return Err(MqError::ChannelFailure(
                    "connection is closed".to_string(),
                ));
            }
            Ok(Arc::new(MockChannel {
                shared: Arc::clone(&self.shared),
                closed: AtomicBool::new(false),
            }) as Arc<dyn BrokerChannel>)
        })
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events_tx.subscribe()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.open.store(false, Ordering::SeqCst);
        })
    }
}

/// One mock channel.
struct MockChannel {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl BrokerChannel for MockChannel {
    fn publish<'a>(
        &'a self,
        exchange: &'a str,
        routing_key: &'a str,
        properties: &'a PublishProperties,
        body: &'a [u8],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.is_closed() {
                return Err(MqError::PublishFailure {
                    routing_key: routing_key.to_string(),
                    reason: "channel is closed".to_string(),
                });
            }

            let scripted = self.shared.publish_failure.lock().unwrap().clone();
            if let Some((failing_key, reason)) = scripted {
                if failing_key == routing_key {
                    return Err(MqError::PublishFailure {
                        routing_key: routing_key.to_string(),
                        reason,
                    });
                }
            }

            self.shared.published.lock().unwrap().push(PublishedMessage {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                correlation_id: properties.correlation_id.clone(),
                reply_to: properties.reply_to.clone(),
                body: body.to_vec(),
            });
            Ok(())
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
        })
    }
}
