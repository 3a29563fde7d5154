//! # Ticket Relay Testing
//!
//! In-memory mock collaborators for testing the Ticket Relay messaging
//! layer without a broker:
//!
//! - [`MockBroker`]: an in-memory broker client that records every
//!   published message and supports scripted connect/publish failures and
//!   on-demand shutdown events.
//! - [`MockTicketMapper`]: serializes tickets to JSON; can be scripted to
//!   fail.
//!
//! ## Example
//!
//! ```ignore
//! use ticket_relay_testing::MockBroker;
//!
//! #[tokio::test]
//! async fn test_reconnect() {
//!     let broker = Arc::new(MockBroker::new());
//!     let registry = ChannelRegistry::new(broker.clone(), RegistryConfig::default());
//!
//!     let id = registry.allocate_id().await;
//!     registry.get_channel(id).await?;
//!
//!     broker.fire_shutdown("connection reset").await;
//!     // next get_channel reconnects
//! }
//! ```

/// In-memory broker client mock
pub mod broker;

/// Ticket mapper mock
pub mod mapper;

pub use broker::{MockBroker, PublishedMessage};
pub use mapper::MockTicketMapper;
