//! Broker connection and channel lifecycle management.
//!
//! The registry owns the single shared broker connection and hands out
//! per-id channel handles. Connection churn is hidden behind the stable
//! ids: when the broker reports a shutdown, live slots are marked for
//! deletion and swept lazily by the next caller, which also tears down the
//! stale connection and creates a fresh one.
//!
//! # State machine (per connection)
//!
//! ```text
//! Absent → Open → ShutdownDetected → (Probing → Recreating) → Open
//!                                                   Open → Disposed
//! ```
//!
//! # Locking
//!
//! All mutation funnels through one `tokio::sync::Mutex` over the inner
//! state, so no caller ever observes a half-recreated connection. Steady
//! state lookups hold the lock only long enough to clone a channel handle;
//! callers block on it for the duration of connection (re)creation, which
//! is rare. The shutdown notification handler never blocks on broker I/O:
//! it sets a flag and marks live slots, leaving the sweep to later calls.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use ticket_relay_core::broker::{BrokerChannel, BrokerClient, BrokerConnection, ConnectionEvent};
use ticket_relay_core::error::{MqError, Result};
use tokio::sync::{Mutex, broadcast};

use crate::config::RegistryConfig;

/// Upper bound on release attempts in a single sweep pass.
const SWEEP_ITERATION_CAP: usize = 100;

/// One registered channel slot.
struct ChannelSlot {
    channel: Arc<dyn BrokerChannel>,
    marked_for_deletion: bool,
}

/// Mutable registry state, guarded by a single lock.
struct RegistryInner {
    connection: Option<Arc<dyn BrokerConnection>>,
    /// `None` means the id is reserved but not yet materialized.
    channels: HashMap<u16, Option<ChannelSlot>>,
    next_scan_id: u16,
}

/// Owns the shared broker connection and a keyed set of channel handles.
pub struct ChannelRegistry {
    client: Arc<dyn BrokerClient>,
    config: RegistryConfig,
    inner: Arc<Mutex<RegistryInner>>,
    shutdown: Arc<AtomicBool>,
}

impl ChannelRegistry {
    /// Create a registry over the given broker client.
    #[must_use]
    pub fn new(client: Arc<dyn BrokerClient>, config: RegistryConfig) -> Self {
        Self {
            client,
            config,
            inner: Arc::new(Mutex::new(RegistryInner {
                connection: None,
                channels: HashMap::new(),
                next_scan_id: 1,
            })),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reserve and return an id not currently present in the registry.
    ///
    /// Up to `id_draw_budget` random draws are attempted; when the budget
    /// is exhausted the allocator degrades to a linear scan from the last
    /// draw, so returned ids stay pairwise distinct as long as the id
    /// space is not full. The id is reserved with an empty slot under the
    /// registry lock before returning, so two concurrent callers cannot
    /// pick the same id.
    pub async fn allocate_id(&self) -> u16 {
        let mut inner = self.inner.lock().await;

        let mut candidate: u16 = 1;
        for _ in 0..self.config.id_draw_budget {
            candidate = rand::thread_rng().gen_range(1..=u16::MAX);
            if !inner.channels.contains_key(&candidate) {
                inner.channels.insert(candidate, None);
                return candidate;
            }
        }

        // Draw budget exhausted: scan for a free id instead of handing out
        // a possible collision.
        let start = inner.next_scan_id;
        let mut id = start;
        loop {
            if !inner.channels.contains_key(&id) {
                inner.next_scan_id = id.wrapping_add(1).max(1);
                inner.channels.insert(id, None);
                tracing::warn!(id, budget = self.config.id_draw_budget, "id draw budget exhausted, allocated by scan");
                return id;
            }
            id = id.wrapping_add(1).max(1);
            if id == start {
                break;
            }
        }

        tracing::error!(id = candidate, "channel id space exhausted, returning colliding id");
        candidate
    }

    /// Get (or materialize) the channel for a reserved id.
    ///
    /// Idempotent: two calls without an intervening shutdown return the
    /// same channel handle. A detected shutdown triggers a probe
    /// connection, a sweep of every slot, and a full connection rebuild
    /// before a fresh channel is handed out.
    ///
    /// # Errors
    ///
    /// Returns [`MqError::ConnectFailure`] when a connection cannot be
    /// established or is not open, and [`MqError::ChannelFailure`] when
    /// channel materialization fails on an open connection. Both should be
    /// treated as "not ready yet, retry later".
    pub async fn get_channel(&self, id: u16) -> Result<Arc<dyn BrokerChannel>> {
        let mut inner = self.inner.lock().await;

        if inner.connection.is_none() {
            let connection = self.client.connect().await?;
            // Clear the flag before the listener can observe any event, so
            // a shutdown arriving right after connect is never lost.
            self.shutdown.store(false, Ordering::SeqCst);
            Self::spawn_event_listener(
                connection.events(),
                Arc::clone(&self.inner),
                Arc::clone(&self.shutdown),
            );
            tracing::info!("broker connection established");
            inner.connection = Some(connection);
        }

        if self.shutdown.load(Ordering::SeqCst) {
            self.recover_connection(&mut inner).await;
        }

        let connection = match inner.connection.as_ref() {
            Some(connection) if connection.is_open() => Arc::clone(connection),
            _ => {
                return Err(MqError::ConnectFailure(
                    "broker connection is not open".to_string(),
                ));
            }
        };

        if let Some(Some(slot)) = inner.channels.get(&id) {
            if !slot.marked_for_deletion && !slot.channel.is_closed() {
                return Ok(Arc::clone(&slot.channel));
            }
        }

        let channel = connection.open_channel().await.map_err(|e| {
            tracing::error!(id, error = %e, "failed to materialize channel");
            e
        })?;
        tracing::debug!(id, "channel materialized");
        inner.channels.insert(
            id,
            Some(ChannelSlot {
                channel: Arc::clone(&channel),
                marked_for_deletion: false,
            }),
        );
        Ok(channel)
    }

    /// Release the channel for an id if it has been marked for deletion.
    ///
    /// The underlying channel is closed and the slot reset to empty; the
    /// id itself stays reserved for its owner.
    pub async fn release_channel(&self, id: u16) {
        let mut inner = self.inner.lock().await;
        let marked = matches!(
            inner.channels.get(&id),
            Some(Some(slot)) if slot.marked_for_deletion
        );
        if marked {
            if let Some(Some(slot)) = inner.channels.insert(id, None) {
                slot.channel.close().await;
                tracing::debug!(id, "released marked channel");
            }
        }
    }

    /// Tear down every channel and the connection itself.
    ///
    /// Used on process shutdown; the registry can be reused afterwards
    /// (the next `get_channel` reconnects).
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        for slot in inner.channels.values_mut().flatten() {
            slot.marked_for_deletion = true;
        }
        Self::sweep_marked_channels(&mut inner).await;
        if let Some(connection) = inner.connection.take() {
            connection.close().await;
            tracing::info!("broker connection disposed");
        }
        self.shutdown.store(false, Ordering::SeqCst);
    }

    /// Probe the broker and rebuild the connection after a detected shutdown.
    ///
    /// Probe failures are swallowed: the stale state is kept and the caller
    /// fails with `ConnectFailure` on the open-check, retrying on its next
    /// invocation.
    async fn recover_connection(&self, inner: &mut RegistryInner) {
        match self.client.connect().await {
            Ok(probe) => {
                probe.close().await;

                for slot in inner.channels.values_mut().flatten() {
                    slot.marked_for_deletion = true;
                }
                Self::sweep_marked_channels(inner).await;

                if let Some(stale) = inner.connection.take() {
                    stale.close().await;
                }
                tokio::time::sleep(self.config.reconnect_backoff).await;

                match self.client.connect().await {
                    Ok(connection) => {
                        self.shutdown.store(false, Ordering::SeqCst);
                        Self::spawn_event_listener(
                            connection.events(),
                            Arc::clone(&self.inner),
                            Arc::clone(&self.shutdown),
                        );
                        tracing::info!("broker connection recreated after shutdown");
                        inner.connection = Some(connection);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reconnect after probe failed");
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "broker probe failed, will retry on next call");
            }
        }
    }

    /// Release marked slots, one per iteration, up to a fixed cap.
    async fn sweep_marked_channels(inner: &mut RegistryInner) {
        for _ in 0..SWEEP_ITERATION_CAP {
            let marked_id = inner.channels.iter().find_map(|(id, slot)| {
                slot.as_ref()
                    .filter(|s| s.marked_for_deletion)
                    .map(|_| *id)
            });
            let Some(id) = marked_id else {
                break;
            };
            if let Some(Some(slot)) = inner.channels.insert(id, None) {
                slot.channel.close().await;
                tracing::debug!(id, "swept marked channel");
            }
        }
    }

    /// Forward connection lifecycle events into registry state.
    ///
    /// The handler only flips flags and marks slots; closing channels and
    /// rebuilding the connection happen lazily on the next `get_channel`.
    fn spawn_event_listener(
        mut events: broadcast::Receiver<ConnectionEvent>,
        inner: Arc<Mutex<RegistryInner>>,
        shutdown: Arc<AtomicBool>,
    ) {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConnectionEvent::Shutdown { reason }) => {
                        tracing::warn!(reason = %reason, "broker connection shutdown detected");
                        shutdown.store(true, Ordering::SeqCst);
                        let mut inner = inner.lock().await;
                        for slot in inner.channels.values_mut().flatten() {
                            slot.marked_for_deletion = true;
                        }
                        break;
                    }
                    Ok(ConnectionEvent::Blocked { reason }) => {
                        tracing::warn!(reason = %reason, "broker connection blocked");
                    }
                    Ok(ConnectionEvent::Unblocked) => {
                        tracing::info!("broker connection unblocked");
                    }
                    Ok(ConnectionEvent::CallbackError { detail }) => {
                        tracing::error!(detail = %detail, "broker callback error");
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "connection event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// The fixed backoff applied between connection teardown and rebuild.
    #[must_use]
    pub const fn reconnect_backoff(&self) -> Duration {
        self.config.reconnect_backoff
    }
}
