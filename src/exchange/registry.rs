//! Name-keyed construction of exchange connectors.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::Exchange;
use crate::config::ConfigStore;
use crate::error::{ConfigError, Result};
use crate::market::MarketDataCache;

/// Builds a connector around the shared cache and config store.
pub type ExchangeConstructor = fn(Arc<MarketDataCache>, Arc<dyn ConfigStore>) -> Arc<dyn Exchange>;

/// Registry of known connectors, keyed by lowercase exchange name.
#[derive(Default, Clone)]
pub struct ExchangeRegistry {
    constructors: BTreeMap<String, ExchangeConstructor>,
}

impl ExchangeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, constructor: ExchangeConstructor) -> &mut Self {
        self.constructors.insert(name.to_lowercase(), constructor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Build the connector registered under `name`.
    pub fn create(
        &self,
        name: &str,
        cache: Arc<MarketDataCache>,
        store: Arc<dyn ConfigStore>,
    ) -> Result<Arc<dyn Exchange>> {
        let constructor = self
            .constructors
            .get(&name.to_lowercase())
            .ok_or_else(|| ConfigError::ExchangeNotFound(name.to_string()))?;
        Ok(constructor(cache, store))
    }

    /// Build and set up every named exchange.
    ///
    /// Exchanges that are unknown, missing from the store, or fail setup are
    /// skipped with a warning. Exchanges disabled in config are returned.
    pub async fn load(
        &self,
        names: &[String],
        cache: &Arc<MarketDataCache>,
        store: &Arc<dyn ConfigStore>,
    ) -> Vec<Arc<dyn Exchange>> {
        let mut loaded = Vec::with_capacity(names.len());
        for name in names {
            let config = match store.exchange_config(name) {
                Ok(config) => config,
                Err(err) => {
                    warn!(exchange = %name, error = %err, "no config for exchange");
                    continue;
                }
            };
            let exchange = match self.create(name, Arc::clone(cache), Arc::clone(store)) {
                Ok(exchange) => exchange,
                Err(err) => {
                    warn!(exchange = %name, error = %err, "unknown exchange");
                    continue;
                }
            };
            if let Err(err) = exchange.setup(&config).await {
                warn!(exchange = %name, error = %err, "exchange setup failed, disabling");
                exchange.set_enabled(false);
                continue;
            }
            info!(exchange = %name, enabled = exchange.is_enabled(), "exchange loaded");
            loaded.push(exchange);
        }
        loaded
    }
}

impl std::fmt::Debug for ExchangeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRegistry")
            .field("exchanges", &self.names())
            .finish()
    }
}
