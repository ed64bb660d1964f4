#![allow(dead_code)]

use std::sync::Arc;

use venuekit::config::{ConfigStore, ExchangeConfig, MemoryConfigStore};
use venuekit::exchange::Exchange;
use venuekit::market::MarketDataCache;
use venuekit::testkit::config;
use venuekit::testkit::exchange::{MockExchange, MOCK_EXCHANGE};

/// A mock exchange wired to its own store and cache.
pub struct Harness {
    pub exchange: Arc<MockExchange>,
    pub store: Arc<MemoryConfigStore>,
    pub cache: Arc<MarketDataCache>,
}

impl Harness {
    pub fn new(config: ExchangeConfig) -> Self {
        Self::build(config, |exchange| exchange)
    }

    pub fn build(config: ExchangeConfig, customize: impl FnOnce(MockExchange) -> MockExchange) -> Self {
        let store = config::store([config]);
        let cache = Arc::new(MarketDataCache::new());
        let exchange = MockExchange::new(
            Arc::clone(&cache),
            Arc::clone(&store) as Arc<dyn ConfigStore>,
        );
        Self {
            exchange: Arc::new(customize(exchange)),
            store,
            cache,
        }
    }

    /// Run setup with the stored config.
    pub async fn setup(&self) {
        let config = self.stored();
        self.exchange.setup(&config).await.unwrap();
    }

    pub fn stored(&self) -> ExchangeConfig {
        self.store.exchange_config(MOCK_EXCHANGE).unwrap()
    }
}

/// Enabled mock config with the given comma-joined pair sets.
pub fn mock_config(enabled: &str, available: &str) -> ExchangeConfig {
    config::exchange(MOCK_EXCHANGE, enabled, available)
}
