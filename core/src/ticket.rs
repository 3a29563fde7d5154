//! Ticket payload model.
//!
//! The full domain model (fluent builders, validation rules, DTO mapping)
//! lives outside this layer. The relay only needs the fields that drive
//! correlation and cache-timeout decisions: the ticket id, the correlation
//! id, the conversation leg, and whether any selection references a live
//! market.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The leg of a ticket conversation a message belongs to.
///
/// A ticket id is reused across the legs of one conversation (ticket,
/// acknowledgment, cancellation, ...); only the most recent leg's
/// correlation is meaningful for response matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketKind {
    /// Initial betting request.
    Ticket,

    /// Acknowledgment of an accepted ticket.
    TicketAck,

    /// Cancellation request for a previously sent ticket.
    TicketCancel,

    /// Acknowledgment of a cancellation.
    TicketCancelAck,

    /// Cashout request.
    TicketCashout,

    /// Response to a reoffer from the platform.
    TicketReoffer,
}

/// A single selection referenced by a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Platform event identifier.
    pub event_id: String,

    /// Platform market identifier.
    pub market_id: String,

    /// Odds in the platform's fixed-point representation, when applicable.
    pub odds: Option<u32>,

    /// Whether the selection references a live (in-play) market.
    ///
    /// Live selections age out of the pending cache faster than prematch
    /// ones, since a live response that arrives late is worthless.
    pub live: bool,
}

/// A domain message exchanged with the remote trading platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Caller-assigned ticket id, reused across conversation legs.
    pub ticket_id: String,

    /// Correlation id echoed on the asynchronous response.
    pub correlation_id: String,

    /// Conversation leg.
    pub kind: TicketKind,

    /// Selections the ticket references.
    pub selections: Vec<Selection>,

    /// Externally-defined payload carried as-is to the mapper.
    pub body: serde_json::Value,
}

impl Ticket {
    /// Start building a ticket for the given conversation leg.
    #[must_use]
    pub fn builder(kind: TicketKind, ticket_id: impl Into<String>) -> TicketBuilder {
        TicketBuilder {
            ticket_id: ticket_id.into(),
            correlation_id: new_correlation_id(),
            kind,
            selections: Vec::new(),
            body: serde_json::Value::Null,
        }
    }

    /// Returns `true` if any selection references a live market.
    #[must_use]
    pub fn has_live_selection(&self) -> bool {
        self.selections.iter().any(|s| s.live)
    }
}

/// Builder for [`Ticket`].
#[derive(Debug, Clone)]
pub struct TicketBuilder {
    ticket_id: String,
    correlation_id: String,
    kind: TicketKind,
    selections: Vec<Selection>,
    body: serde_json::Value,
}

impl TicketBuilder {
    /// Override the generated correlation id.
    ///
    /// An empty correlation id is accepted here but the dispatcher will log
    /// a warning: the ticket cannot be matched to a later response.
    #[must_use]
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Add a selection.
    #[must_use]
    pub fn selection(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    /// Set the externally-defined payload body.
    #[must_use]
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    /// Build the [`Ticket`].
    #[must_use]
    pub fn build(self) -> Ticket {
        Ticket {
            ticket_id: self.ticket_id,
            correlation_id: self.correlation_id,
            kind: self.kind,
            selections: self.selections,
            body: self.body,
        }
    }
}

/// Generate a fresh correlation id.
#[must_use]
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn builder_generates_correlation_id() {
        let ticket = Ticket::builder(TicketKind::Ticket, "t-1").build();
        assert_eq!(ticket.ticket_id, "t-1");
        assert!(!ticket.correlation_id.is_empty());
    }

    #[test]
    fn correlation_ids_are_unique() {
        let a = new_correlation_id();
        let b = new_correlation_id();
        assert_ne!(a, b);
    }

    #[test]
    fn live_selection_detection() {
        let live = Selection {
            event_id: "ev-1".to_string(),
            market_id: "live:mkt-1".to_string(),
            odds: Some(10_400),
            live: true,
        };
        let prematch = Selection {
            event_id: "ev-2".to_string(),
            market_id: "mkt-2".to_string(),
            odds: None,
            live: false,
        };

        let ticket = Ticket::builder(TicketKind::Ticket, "t-1")
            .selection(prematch.clone())
            .build();
        assert!(!ticket.has_live_selection());

        let ticket = Ticket::builder(TicketKind::Ticket, "t-2")
            .selection(prematch)
            .selection(live)
            .build();
        assert!(ticket.has_live_selection());
    }
}
