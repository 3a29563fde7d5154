//! Broker client collaborator traits.
//!
//! The relay assumes an existing broker client and never implements a wire
//! protocol. These traits model the minimal surface it needs:
//!
//! - [`BrokerClient::connect`] produces a [`BrokerConnection`]
//! - [`BrokerConnection::open_channel`] produces a [`BrokerChannel`], a
//!   lightweight multiplexed session used to isolate publish concerns
//! - [`BrokerConnection::events`] delivers shutdown/blocked/unblocked
//!   notifications; handlers must not block, so events arrive on a
//!   broadcast channel consumed by a background task
//!
//! # Dyn Compatibility
//!
//! All async methods return explicit `Pin<Box<dyn Future>>` instead of
//! `async fn` so the traits can be held as `Arc<dyn BrokerClient>` etc.
//! and injected into the registry and publisher.

use crate::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle notifications emitted by a broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection has shut down; channels on it are no longer usable.
    Shutdown {
        /// Broker-reported shutdown reason
        reason: String,
    },

    /// The broker applied backpressure and blocked the connection.
    Blocked {
        /// Broker-reported block reason
        reason: String,
    },

    /// The broker lifted backpressure.
    Unblocked,

    /// A broker callback raised an error.
    CallbackError {
        /// Error detail
        detail: String,
    },
}

/// Delivery metadata placed on an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishProperties {
    /// Correlation id echoed on the asynchronous response.
    pub correlation_id: String,

    /// Routing key the response should be published to.
    pub reply_to: String,
}

/// Entry point of the broker client collaborator.
pub trait BrokerClient: Send + Sync {
    /// Establish a new connection to the broker.
    ///
    /// # Errors
    ///
    /// Returns [`MqError::ConnectFailure`](crate::MqError::ConnectFailure)
    /// when the broker is unreachable.
    fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn BrokerConnection>>>;
}

/// A live connection to the broker.
pub trait BrokerConnection: Send + Sync {
    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;

    /// Open a new channel on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`MqError::ChannelFailure`](crate::MqError::ChannelFailure)
    /// when the channel cannot be materialized.
    fn open_channel(&self) -> BoxFuture<'_, Result<Arc<dyn BrokerChannel>>>;

    /// Subscribe to lifecycle notifications for this connection.
    ///
    /// Each call returns an independent receiver; events published before
    /// the call are not replayed.
    fn events(&self) -> broadcast::Receiver<ConnectionEvent>;

    /// Close the connection and all channels on it.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// A lightweight multiplexed session over a broker connection.
pub trait BrokerChannel: Send + Sync {
    /// Publish raw bytes with delivery metadata.
    ///
    /// # Errors
    ///
    /// Returns [`MqError::PublishFailure`](crate::MqError::PublishFailure)
    /// on transport-level failures.
    fn publish<'a>(
        &'a self,
        exchange: &'a str,
        routing_key: &'a str,
        properties: &'a PublishProperties,
        body: &'a [u8],
    ) -> BoxFuture<'a, Result<()>>;

    /// Whether the channel has been closed.
    fn is_closed(&self) -> bool;

    /// Close the channel.
    fn close(&self) -> BoxFuture<'_, ()>;
}
