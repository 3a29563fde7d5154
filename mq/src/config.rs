//! Configuration for the registry and dispatcher.
//!
//! Values should be provided by the application; the defaults match the
//! remote trading platform's recommended client settings.

use std::time::Duration;

/// Channel registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Fixed backoff between tearing down a dead connection and creating a
    /// fresh one.
    ///
    /// Default: 1 second
    pub reconnect_backoff: Duration,

    /// How many random draws `allocate_id` attempts before degrading to a
    /// linear scan for a free id.
    ///
    /// Default: 1000
    pub id_draw_budget: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(1),
            id_draw_budget: 1000,
        }
    }
}

impl RegistryConfig {
    /// Set the reconnect backoff.
    #[must_use]
    pub const fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Set the random-draw budget for id allocation.
    #[must_use]
    pub const fn with_id_draw_budget(mut self, budget: usize) -> Self {
        self.id_draw_budget = budget;
        self
    }
}

/// Ticket dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Routing key outbound tickets are published with.
    pub routing_key: String,

    /// Routing key the platform should publish responses to.
    pub reply_routing_key: String,

    /// Exchange outbound tickets are published to, when the broker
    /// distinguishes one.
    pub exchange: Option<String>,

    /// How long a pending entry for a ticket with a live selection stays
    /// claimable.
    ///
    /// Default: 20 seconds
    pub live_cache_timeout: Duration,

    /// How long a pending entry for a prematch ticket stays claimable.
    ///
    /// Default: 80 seconds
    pub prematch_cache_timeout: Duration,

    /// Interval between sweep passes after the first one.
    ///
    /// Default: 10 seconds
    pub sweep_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            routing_key: "ticket.send".to_string(),
            reply_routing_key: "ticket.confirm".to_string(),
            exchange: None,
            live_cache_timeout: Duration::from_secs(20),
            prematch_cache_timeout: Duration::from_secs(80),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

impl DispatcherConfig {
    /// Set the publish routing key.
    #[must_use]
    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = routing_key.into();
        self
    }

    /// Set the reply routing key.
    #[must_use]
    pub fn with_reply_routing_key(mut self, reply_routing_key: impl Into<String>) -> Self {
        self.reply_routing_key = reply_routing_key.into();
        self
    }

    /// Set the publish exchange.
    #[must_use]
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    /// Set the cache timeout for tickets with live selections.
    #[must_use]
    pub const fn with_live_cache_timeout(mut self, timeout: Duration) -> Self {
        self.live_cache_timeout = timeout;
        self
    }

    /// Set the cache timeout for prematch tickets.
    #[must_use]
    pub const fn with_prematch_cache_timeout(mut self, timeout: Duration) -> Self {
        self.prematch_cache_timeout = timeout;
        self
    }

    /// Set the sweep interval.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// The larger of the two class timeouts.
    ///
    /// Used as the delay before the first sweep: no entry can be stale
    /// earlier than this.
    #[must_use]
    pub fn max_cache_timeout(&self) -> Duration {
        self.live_cache_timeout.max(self.prematch_cache_timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn max_cache_timeout_picks_larger_class() {
        let config = DispatcherConfig::default()
            .with_live_cache_timeout(Duration::from_secs(5))
            .with_prematch_cache_timeout(Duration::from_secs(60));
        assert_eq!(config.max_cache_timeout(), Duration::from_secs(60));

        let config = config.with_live_cache_timeout(Duration::from_secs(90));
        assert_eq!(config.max_cache_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = DispatcherConfig::default()
            .with_routing_key("custom.send")
            .with_exchange("tickets");
        assert_eq!(config.routing_key, "custom.send");
        assert_eq!(config.exchange.as_deref(), Some("tickets"));
        assert_eq!(config.reply_routing_key, "ticket.confirm");
    }
}
