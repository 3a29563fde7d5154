//! # Ticket Relay MQ
//!
//! Broker-facing runtime for the Ticket Relay messaging layer.
//!
//! ## Core Components
//!
//! - **`ChannelRegistry`**: owns the single shared broker connection and a
//!   keyed set of channel slots; hides connection churn behind stable
//!   per-id channel handles and recreates the connection after a detected
//!   shutdown.
//! - **`PublisherChannel`**: wraps one registry slot for outbound publishing;
//!   transport failures are raised as notifications instead of errors so
//!   high-volume senders are never serialized by error bookkeeping.
//! - **`TicketDispatcher`**: the authoritative "send and remember" path;
//!   serializes tickets via an injected mapper, records a pending
//!   correlation entry per ticket id, publishes, and evicts stale entries
//!   with a background sweep.
//!
//! ## Example
//!
//! ```ignore
//! use ticket_relay_mq::{ChannelRegistry, PublisherChannel, TicketDispatcher};
//! use ticket_relay_mq::config::{DispatcherConfig, RegistryConfig};
//!
//! let registry = Arc::new(ChannelRegistry::new(broker_client, RegistryConfig::default()));
//! let (publisher, failures) = PublisherChannel::new(Arc::clone(&registry)).await;
//! publisher.open().await?;
//!
//! let dispatcher = TicketDispatcher::new(
//!     mapper,
//!     Arc::new(publisher),
//!     failures,
//!     DispatcherConfig::default(),
//! )?;
//!
//! dispatcher.send_ticket(&ticket).await?;
//! ```

/// Configuration for the registry and dispatcher
pub mod config;

/// Outbound dispatch with correlation caching and timeout-based eviction
pub mod dispatcher;

/// Publishing over a registry-managed channel
pub mod publisher;

/// Broker connection and channel lifecycle management
pub mod registry;

pub use config::{DispatcherConfig, RegistryConfig};
pub use dispatcher::TicketDispatcher;
pub use publisher::PublisherChannel;
pub use registry::ChannelRegistry;
