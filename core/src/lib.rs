//! # Ticket Relay Core
//!
//! Shared types and collaborator traits for the Ticket Relay messaging layer.
//!
//! This crate defines the seams between the relay and its external
//! collaborators:
//!
//! - **Broker client**: [`broker::BrokerClient`], [`broker::BrokerConnection`],
//!   and [`broker::BrokerChannel`] abstract over the message broker. The relay
//!   never speaks a wire protocol itself; a concrete broker client is injected.
//! - **Ticket mapper**: [`mapper::TicketMapper`] turns a domain [`ticket::Ticket`]
//!   into the externally-defined JSON bytes placed on the wire.
//! - **Notifications**: [`events::PublishFailure`] (internal, channel to
//!   dispatcher) and [`events::TicketSendFailed`] (outward, dispatcher to
//!   subscribers) carry failure context instead of thrown errors, so
//!   high-volume senders are never blocked on error bookkeeping.
//!
//! Delivery semantics are **at-least-once with client-side correlation**:
//! every outbound message carries a correlation id that the remote platform
//! echoes on its asynchronous response, and the dispatcher keeps a pending
//! entry per ticket id until the response is claimed or the entry goes stale.

/// Broker client collaborator traits and connection events
pub mod broker;

/// Error taxonomy for messaging operations
pub mod error;

/// Failure notification payloads
pub mod events;

/// Ticket mapper collaborator trait
pub mod mapper;

/// Ticket payload model
pub mod ticket;

pub use broker::{BrokerChannel, BrokerClient, BrokerConnection, ConnectionEvent, PublishProperties};
pub use error::{MqError, Result};
pub use events::{PublishFailure, TicketSendFailed};
pub use mapper::TicketMapper;
pub use ticket::{Selection, Ticket, TicketKind};
