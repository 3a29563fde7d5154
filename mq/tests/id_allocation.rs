//! Property: allocated ids are pairwise distinct.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use ticket_relay_core::broker::BrokerClient;
use ticket_relay_mq::config::RegistryConfig;
use ticket_relay_mq::ChannelRegistry;
use ticket_relay_testing::MockBroker;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn allocated_ids_are_pairwise_distinct(count in 1usize..256, draw_budget in 0usize..64) {
        tokio_test::block_on(async move {
            let client: Arc<dyn BrokerClient> = Arc::new(MockBroker::new());
            let registry = ChannelRegistry::new(
                client,
                RegistryConfig::default().with_id_draw_budget(draw_budget),
            );

            let mut seen = HashSet::new();
            for _ in 0..count {
                let id = registry.allocate_id().await;
                prop_assert!(seen.insert(id), "id {id} allocated twice");
            }
            Ok(())
        })?;
    }
}
