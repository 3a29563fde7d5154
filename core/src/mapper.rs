//! Ticket mapper collaborator trait.

use crate::error::Result;
use crate::ticket::Ticket;

/// Serializes a domain ticket into the externally-defined wire JSON.
///
/// The mapping rules (DTO shapes, schema versions) live outside this layer;
/// the relay treats the produced bytes as opaque.
pub trait TicketMapper: Send + Sync {
    /// Map a ticket to its wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`MqError::MappingFailed`](crate::MqError::MappingFailed)
    /// when the ticket cannot be serialized.
    fn map(&self, ticket: &Ticket) -> Result<Vec<u8>>;
}
