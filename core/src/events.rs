//! Failure notification payloads.
//!
//! Publish failures are funneled through notifications rather than thrown
//! from the send path: the publisher reports a [`PublishFailure`] on an
//! internal channel, the dispatcher resolves it to a ticket and broadcasts
//! a [`TicketSendFailed`] to subscribers. Both carry enough context for the
//! caller to decide whether to resend.

/// A transport-level publish failure.
///
/// Internal notification, produced by the publisher channel and consumed by
/// the dispatcher's failure bridge.
#[derive(Debug, Clone)]
pub struct PublishFailure {
    /// Message bytes that failed to publish.
    pub raw_data: Vec<u8>,

    /// Correlation id the message carried.
    pub correlation_id: String,

    /// Routing key the publish targeted.
    pub routing_key: String,

    /// Transport error detail.
    pub error_message: String,
}

/// An outbound ticket could not be sent.
///
/// Broadcast to subscribers of the dispatcher. The pending entry for the
/// ticket is left in place until the next sweep, so a late caller can still
/// claim it for inspection.
#[derive(Debug, Clone)]
pub struct TicketSendFailed {
    /// Id of the ticket whose publish failed.
    pub ticket_id: String,

    /// Serialized body that was handed to the broker.
    pub body: Vec<u8>,

    /// Transport error detail.
    pub error_message: String,
}
