//! Outbound ticket dispatch with correlation caching.
//!
//! The dispatcher is the authoritative "send and remember" path: every
//! ticket handed to [`TicketDispatcher::send_ticket`] is serialized through
//! the injected mapper, recorded as a pending entry keyed by ticket id, and
//! published. When the matching response arrives (delivered by an external
//! consumer, out of scope here), the caller claims the entry with
//! [`TicketDispatcher::get_sent_ticket`].
//!
//! Two background tasks complete the picture:
//!
//! - a **sweep** that evicts pending entries older than their ticket-class
//!   timeout, scheduled single-shot-rearm style (the next pass is armed
//!   only after the current one finishes, so passes never overlap);
//! - a **failure bridge** that consumes the publisher's failure channel and
//!   broadcasts [`TicketSendFailed`] notifications, leaving the pending
//!   entry for the sweep so a late caller can still inspect it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use ticket_relay_core::error::Result;
use ticket_relay_core::events::{PublishFailure, TicketSendFailed};
use ticket_relay_core::mapper::TicketMapper;
use ticket_relay_core::ticket::{Ticket, TicketKind};
use tokio::sync::{RwLock, broadcast, mpsc};

use crate::config::DispatcherConfig;
use crate::publisher::PublisherChannel;

/// Capacity of the outward send-failed broadcast channel.
const SEND_FAILED_CAPACITY: usize = 64;

/// One outbound message awaiting its asynchronous response.
#[derive(Debug, Clone)]
struct PendingSend {
    kind: TicketKind,
    correlation_id: String,
    timeout: Duration,
    ticket: Ticket,
    created_at: Instant,
}

/// Consumes domain tickets, publishes them, and tracks pending correlations.
pub struct TicketDispatcher {
    mapper: Arc<dyn TicketMapper>,
    publisher: Arc<PublisherChannel>,
    config: DispatcherConfig,
    pending: Arc<RwLock<HashMap<String, PendingSend>>>,
    send_failed_tx: broadcast::Sender<TicketSendFailed>,
}

impl TicketDispatcher {
    /// Create a dispatcher over an opened publisher.
    ///
    /// Spawns the failure bridge and the sweep task. The sweep first fires
    /// after the maximum class timeout (nothing can be stale earlier) and
    /// thereafter once per configured interval, rearmed only after each
    /// pass completes.
    ///
    /// # Errors
    ///
    /// Returns [`MqError::MissingDependency`](ticket_relay_core::MqError::MissingDependency)
    /// when the publisher has not been opened.
    pub fn new(
        mapper: Arc<dyn TicketMapper>,
        publisher: Arc<PublisherChannel>,
        failures: mpsc::UnboundedReceiver<PublishFailure>,
        config: DispatcherConfig,
    ) -> Result<Self> {
        publisher.require_opened()?;

        let pending = Arc::new(RwLock::new(HashMap::new()));
        let (send_failed_tx, _) = broadcast::channel(SEND_FAILED_CAPACITY);

        Self::spawn_failure_bridge(failures, Arc::clone(&pending), send_failed_tx.clone());
        Self::spawn_sweep(Arc::downgrade(&pending), config.clone());

        Ok(Self {
            mapper,
            publisher,
            config,
            pending,
            send_failed_tx,
        })
    }

    /// Serialize, remember, and publish a ticket.
    ///
    /// A prior pending entry for the same ticket id is replaced: a ticket
    /// id is reused across the legs of one conversation and only the most
    /// recent leg's correlation matters. The replacement is informational,
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`MqError::MappingFailed`](ticket_relay_core::MqError::MappingFailed)
    /// when the mapper rejects the ticket. Transport failures do **not**
    /// surface here; subscribe via
    /// [`subscribe_send_failures`](Self::subscribe_send_failures).
    pub async fn send_ticket(&self, ticket: &Ticket) -> Result<()> {
        let bytes = self.mapper.map(ticket)?;
        let timeout = self.cache_timeout(Some(ticket));

        if ticket.correlation_id.is_empty() {
            tracing::warn!(
                ticket_id = %ticket.ticket_id,
                "sending ticket with empty correlation id, response cannot be matched"
            );
        }

        let entry = PendingSend {
            kind: ticket.kind,
            correlation_id: ticket.correlation_id.clone(),
            timeout,
            ticket: ticket.clone(),
            created_at: Instant::now(),
        };
        let replaced = {
            let mut pending = self.pending.write().await;
            pending.insert(ticket.ticket_id.clone(), entry)
        };
        if let Some(old) = replaced {
            tracing::info!(
                ticket_id = %ticket.ticket_id,
                old_kind = ?old.kind,
                new_kind = ?ticket.kind,
                "replaced pending entry for reused ticket id"
            );
        }

        self.publisher
            .publish(
                &bytes,
                &self.config.routing_key,
                &ticket.correlation_id,
                &self.config.reply_routing_key,
                self.config.exchange.as_deref(),
            )
            .await;
        metrics::counter!("relay_tickets_published").increment(1);
        Ok(())
    }

    /// Atomically remove and return the pending entry for a ticket id.
    ///
    /// `None` means the entry was already claimed, evicted by the sweep,
    /// or never sent.
    pub async fn get_sent_ticket(&self, ticket_id: &str) -> Option<Ticket> {
        let mut pending = self.pending.write().await;
        pending.remove(ticket_id).map(|entry| entry.ticket)
    }

    /// The cache timeout applicable to a ticket.
    ///
    /// Tickets referencing a live market age out faster than prematch
    /// ones; `None` yields the maximum configured timeout (used for the
    /// first sweep delay).
    #[must_use]
    pub fn cache_timeout(&self, ticket: Option<&Ticket>) -> Duration {
        match ticket {
            Some(t) if t.has_live_selection() => self.config.live_cache_timeout,
            Some(_) => self.config.prematch_cache_timeout,
            None => self.config.max_cache_timeout(),
        }
    }

    /// Subscribe to send-failed notifications.
    ///
    /// Each receiver sees every failure broadcast after it subscribed.
    #[must_use]
    pub fn subscribe_send_failures(&self) -> broadcast::Receiver<TicketSendFailed> {
        self.send_failed_tx.subscribe()
    }

    /// Number of pending entries currently tracked.
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Resolve publish failures to tickets and broadcast them outward.
    ///
    /// A linear scan over the pending map is fine at its expected size.
    /// The pending entry is intentionally left in place for the sweep.
    fn spawn_failure_bridge(
        mut failures: mpsc::UnboundedReceiver<PublishFailure>,
        pending: Arc<RwLock<HashMap<String, PendingSend>>>,
        send_failed_tx: broadcast::Sender<TicketSendFailed>,
    ) {
        tokio::spawn(async move {
            while let Some(failure) = failures.recv().await {
                let ticket_id = {
                    let pending = pending.read().await;
                    pending
                        .iter()
                        .find(|(_, entry)| entry.correlation_id == failure.correlation_id)
                        .map(|(id, _)| id.clone())
                };
                metrics::counter!("relay_ticket_send_failures").increment(1);

                let Some(ticket_id) = ticket_id else {
                    tracing::warn!(
                        correlation_id = %failure.correlation_id,
                        "publish failure did not match any pending ticket"
                    );
                    continue;
                };
                tracing::warn!(
                    ticket_id = %ticket_id,
                    correlation_id = %failure.correlation_id,
                    error = %failure.error_message,
                    "ticket send failed"
                );
                let notification = TicketSendFailed {
                    ticket_id,
                    body: failure.raw_data,
                    error_message: failure.error_message,
                };
                // No subscribers is a valid state; the notification is best-effort.
                let _ = send_failed_tx.send(notification);
            }
            tracing::debug!("publish failure channel closed, bridge exiting");
        });
    }

    /// Evict stale pending entries on a rearm-after-completion schedule.
    ///
    /// The sweep body is infallible (a retain over the map), so the loop
    /// only ever exits when the dispatcher is dropped; no pass, empty or
    /// evicting, can stop later passes. Holding only a weak reference lets
    /// the task exit once the dispatcher is dropped.
    fn spawn_sweep(pending: Weak<RwLock<HashMap<String, PendingSend>>>, config: DispatcherConfig) {
        tokio::spawn(async move {
            tokio::time::sleep(config.max_cache_timeout()).await;
            loop {
                let Some(pending) = pending.upgrade() else {
                    break;
                };
                let evicted = Self::sweep_pending(&pending).await;
                if evicted > 0 {
                    metrics::counter!("relay_pending_evicted").increment(evicted as u64);
                    tracing::info!(evicted, "swept stale pending tickets");
                }
                drop(pending);
                // Rearm only after the pass finished so sweeps never overlap.
                tokio::time::sleep(config.sweep_interval).await;
            }
            tracing::debug!("dispatcher dropped, sweep exiting");
        });
    }

    /// One sweep pass: remove entries older than their own class timeout.
    async fn sweep_pending(pending: &RwLock<HashMap<String, PendingSend>>) -> usize {
        let now = Instant::now();
        let mut pending = pending.write().await;
        let before = pending.len();
        pending.retain(|ticket_id, entry| {
            let stale = now.duration_since(entry.created_at) > entry.timeout;
            if stale {
                tracing::debug!(
                    ticket_id = %ticket_id,
                    kind = ?entry.kind,
                    age_ms = now.duration_since(entry.created_at).as_millis(),
                    "evicting stale pending ticket"
                );
            }
            !stale
        });
        before - pending.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::registry::ChannelRegistry;
    use ticket_relay_core::broker::BrokerClient;
    use ticket_relay_core::ticket::Selection;
    use ticket_relay_testing::{MockBroker, MockTicketMapper};

    async fn dispatcher_with(
        broker: &Arc<MockBroker>,
        config: DispatcherConfig,
    ) -> TicketDispatcher {
        let client: Arc<dyn BrokerClient> = Arc::clone(broker) as Arc<dyn BrokerClient>;
        let registry = Arc::new(ChannelRegistry::new(client, RegistryConfig::default()));
        let (publisher, failures) = PublisherChannel::new(registry).await;
        publisher.open().await.unwrap();
        TicketDispatcher::new(
            Arc::new(MockTicketMapper::new()),
            Arc::new(publisher),
            failures,
            config,
        )
        .unwrap()
    }

    fn live_ticket(ticket_id: &str) -> Ticket {
        Ticket::builder(TicketKind::Ticket, ticket_id)
            .selection(Selection {
                event_id: "ev-1".to_string(),
                market_id: "live:mkt-1".to_string(),
                odds: Some(10_250),
                live: true,
            })
            .build()
    }

    fn prematch_ticket(ticket_id: &str) -> Ticket {
        Ticket::builder(TicketKind::Ticket, ticket_id)
            .selection(Selection {
                event_id: "ev-2".to_string(),
                market_id: "mkt-2".to_string(),
                odds: Some(18_000),
                live: false,
            })
            .build()
    }

    #[tokio::test]
    async fn construction_requires_opened_publisher() {
        let broker = Arc::new(MockBroker::new());
        let client: Arc<dyn BrokerClient> = Arc::clone(&broker) as Arc<dyn BrokerClient>;
        let registry = Arc::new(ChannelRegistry::new(client, RegistryConfig::default()));
        let (publisher, failures) = PublisherChannel::new(registry).await;

        let result = TicketDispatcher::new(
            Arc::new(MockTicketMapper::new()),
            Arc::new(publisher),
            failures,
            DispatcherConfig::default(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn send_records_pending_and_publishes() {
        let broker = Arc::new(MockBroker::new());
        let dispatcher = dispatcher_with(&broker, DispatcherConfig::default()).await;
        let ticket = prematch_ticket("t-1");

        dispatcher.send_ticket(&ticket).await.unwrap();

        assert_eq!(dispatcher.pending_count().await, 1);
        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].correlation_id, ticket.correlation_id);
        assert_eq!(published[0].reply_to, "ticket.confirm");
    }

    #[tokio::test]
    async fn reused_ticket_id_keeps_only_newest_leg() {
        let broker = Arc::new(MockBroker::new());
        let dispatcher = dispatcher_with(&broker, DispatcherConfig::default()).await;

        let first = prematch_ticket("t-1");
        let ack = Ticket::builder(TicketKind::TicketAck, "t-1").build();
        dispatcher.send_ticket(&first).await.unwrap();
        dispatcher.send_ticket(&ack).await.unwrap();

        assert_eq!(dispatcher.pending_count().await, 1);
        let sent = dispatcher.get_sent_ticket("t-1").await.unwrap();
        assert_eq!(sent.kind, TicketKind::TicketAck);
        assert_eq!(sent.correlation_id, ack.correlation_id);
    }

    #[tokio::test]
    async fn claimed_ticket_is_removed() {
        let broker = Arc::new(MockBroker::new());
        let dispatcher = dispatcher_with(&broker, DispatcherConfig::default()).await;
        dispatcher.send_ticket(&prematch_ticket("t-1")).await.unwrap();

        assert!(dispatcher.get_sent_ticket("t-1").await.is_some());
        assert!(dispatcher.get_sent_ticket("t-1").await.is_none());
        assert_eq!(dispatcher.pending_count().await, 0);
    }

    #[tokio::test]
    async fn cache_timeout_depends_on_ticket_class() {
        let broker = Arc::new(MockBroker::new());
        let config = DispatcherConfig::default()
            .with_live_cache_timeout(Duration::from_secs(20))
            .with_prematch_cache_timeout(Duration::from_secs(80));
        let dispatcher = dispatcher_with(&broker, config).await;

        assert_eq!(
            dispatcher.cache_timeout(Some(&live_ticket("t-1"))),
            Duration::from_secs(20)
        );
        assert_eq!(
            dispatcher.cache_timeout(Some(&prematch_ticket("t-2"))),
            Duration::from_secs(80)
        );
        assert_eq!(dispatcher.cache_timeout(None), Duration::from_secs(80));
    }

    #[tokio::test]
    async fn sweep_evicts_only_stale_entries() {
        let pending = Arc::new(RwLock::new(HashMap::new()));
        let fresh = prematch_ticket("fresh");
        let stale = prematch_ticket("stale");
        {
            let mut map = pending.write().await;
            map.insert(
                "fresh".to_string(),
                PendingSend {
                    kind: fresh.kind,
                    correlation_id: fresh.correlation_id.clone(),
                    timeout: Duration::from_secs(60),
                    ticket: fresh,
                    created_at: Instant::now(),
                },
            );
            map.insert(
                "stale".to_string(),
                PendingSend {
                    kind: stale.kind,
                    correlation_id: stale.correlation_id.clone(),
                    timeout: Duration::from_millis(1),
                    ticket: stale,
                    created_at: Instant::now() - Duration::from_secs(1),
                },
            );
        }

        let evicted = TicketDispatcher::sweep_pending(&pending).await;
        assert_eq!(evicted, 1);
        let map = pending.read().await;
        assert!(map.contains_key("fresh"));
        assert!(!map.contains_key("stale"));
    }

    #[tokio::test]
    async fn empty_correlation_id_still_sends() {
        let broker = Arc::new(MockBroker::new());
        let dispatcher = dispatcher_with(&broker, DispatcherConfig::default()).await;
        let ticket = Ticket::builder(TicketKind::Ticket, "t-1")
            .correlation_id("")
            .build();

        dispatcher.send_ticket(&ticket).await.unwrap();
        assert_eq!(broker.published().len(), 1);
    }
}
