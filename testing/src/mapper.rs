//! Ticket mapper mock.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use std::sync::Mutex;
use ticket_relay_core::error::{MqError, Result};
use ticket_relay_core::mapper::TicketMapper;
use ticket_relay_core::ticket::Ticket;

/// Mock ticket mapper.
///
/// Serializes the whole ticket to JSON. Can be scripted to fail for
/// exercising mapping-error paths.
pub struct MockTicketMapper {
    failure: Mutex<Option<String>>,
}

impl MockTicketMapper {
    /// Create a new mock mapper.
    #[must_use]
    pub fn new() -> Self {
        Self {
            failure: Mutex::new(None),
        }
    }

    /// Fail every mapping with the given reason until cleared.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock().unwrap() = Some(reason.into());
    }

    /// Stop failing mappings.
    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap() = None;
    }
}

impl Default for MockTicketMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketMapper for MockTicketMapper {
    fn map(&self, ticket: &Ticket) -> Result<Vec<u8>> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(MqError::MappingFailed(reason));
        }
        serde_json::to_vec(ticket).map_err(|e| MqError::MappingFailed(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use ticket_relay_core::ticket::TicketKind;

    #[test]
    fn maps_to_json() {
        let mapper = MockTicketMapper::new();
        let ticket = Ticket::builder(TicketKind::Ticket, "t-1").build();
        let bytes = mapper.map(&ticket).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn scripted_failure() {
        let mapper = MockTicketMapper::new();
        mapper.fail_with("schema mismatch");
        let ticket = Ticket::builder(TicketKind::Ticket, "t-1").build();
        assert!(matches!(
            mapper.map(&ticket),
            Err(MqError::MappingFailed(_))
        ));

        mapper.clear_failure();
        assert!(mapper.map(&ticket).is_ok());
    }
}
