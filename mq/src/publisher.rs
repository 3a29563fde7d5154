//! Publishing over a registry-managed channel.
//!
//! A `PublisherChannel` wraps one registry slot for outbound publishing.
//! Transport failures are **reported, not returned**: every failed publish
//! produces a [`PublishFailure`] on the failure channel handed out at
//! construction, so a caller publishing many tickets is never serialized
//! by error handling. The dispatcher consumes that channel and turns
//! failures into caller-visible notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use ticket_relay_core::broker::PublishProperties;
use ticket_relay_core::error::{MqError, Result};
use ticket_relay_core::events::PublishFailure;
use tokio::sync::mpsc;

use crate::registry::ChannelRegistry;

/// Outbound publisher bound to one registry channel id.
pub struct PublisherChannel {
    registry: Arc<ChannelRegistry>,
    channel_id: u16,
    opened: AtomicBool,
    failure_tx: mpsc::UnboundedSender<PublishFailure>,
}

impl PublisherChannel {
    /// Create a publisher and the receiving end of its failure channel.
    ///
    /// Allocates a fresh channel id from the registry; the channel itself
    /// is materialized by [`open`](Self::open).
    pub async fn new(
        registry: Arc<ChannelRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<PublishFailure>) {
        let channel_id = registry.allocate_id().await;
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                channel_id,
                opened: AtomicBool::new(false),
                failure_tx,
            },
            failure_rx,
        )
    }

    /// Acquire the underlying channel. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`MqError::ConnectFailure`] or [`MqError::ChannelFailure`]
    /// when the registry cannot produce a usable channel.
    pub async fn open(&self) -> Result<()> {
        if self.opened.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.registry.get_channel(self.channel_id).await?;
        self.opened.store(true, Ordering::SeqCst);
        tracing::info!(channel_id = self.channel_id, "publisher channel opened");
        Ok(())
    }

    /// Release the underlying channel. Idempotent.
    pub async fn close(&self) {
        if self.opened.swap(false, Ordering::SeqCst) {
            self.registry.release_channel(self.channel_id).await;
            tracing::info!(channel_id = self.channel_id, "publisher channel closed");
        }
    }

    /// Whether [`open`](Self::open) has completed and
    /// [`close`](Self::close) has not been called since.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    /// The registry channel id this publisher is bound to.
    #[must_use]
    pub const fn channel_id(&self) -> u16 {
        self.channel_id
    }

    /// Publish raw bytes with delivery metadata.
    ///
    /// Any failure on the way to the broker, including a registry that
    /// cannot produce a channel, is raised as a [`PublishFailure`]
    /// notification instead of an error.
    pub async fn publish(
        &self,
        msg: &[u8],
        routing_key: &str,
        correlation_id: &str,
        reply_routing_key: &str,
        exchange: Option<&str>,
    ) {
        let channel = match self.registry.get_channel(self.channel_id).await {
            Ok(channel) => channel,
            Err(e) => {
                self.report_failure(msg, correlation_id, routing_key, &e.to_string());
                return;
            }
        };

        let properties = PublishProperties {
            correlation_id: correlation_id.to_string(),
            reply_to: reply_routing_key.to_string(),
        };
        match channel
            .publish(exchange.unwrap_or(""), routing_key, &properties, msg)
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    channel_id = self.channel_id,
                    routing_key,
                    correlation_id,
                    "message published"
                );
            }
            Err(e) => {
                self.report_failure(msg, correlation_id, routing_key, &e.to_string());
            }
        }
    }

    fn report_failure(&self, msg: &[u8], correlation_id: &str, routing_key: &str, error: &str) {
        tracing::error!(
            channel_id = self.channel_id,
            routing_key,
            correlation_id,
            error,
            "publish failed"
        );
        let failure = PublishFailure {
            raw_data: msg.to_vec(),
            correlation_id: correlation_id.to_string(),
            routing_key: routing_key.to_string(),
            error_message: error.to_string(),
        };
        if self.failure_tx.send(failure).is_err() {
            tracing::warn!("publish failure dropped, no consumer attached");
        }
    }

    /// Fail fast when the publisher has not been opened.
    ///
    /// Used by the dispatcher's constructor.
    ///
    /// # Errors
    ///
    /// Returns [`MqError::MissingDependency`] when the publisher is closed.
    pub fn require_opened(&self) -> Result<()> {
        if self.is_opened() {
            Ok(())
        } else {
            Err(MqError::MissingDependency("opened publisher channel"))
        }
    }
}
