//! Canonical test configurations.
//!
//! Single source of truth for exchange configs used across tests.

use std::sync::Arc;

use crate::config::{ExchangeConfig, MemoryConfigStore, NON_DEFAULT_HTTP_LINK};

/// Enabled config with placeholder endpoints and the given pair sets.
///
/// Pair lists are comma separated, exactly as they appear in a config file.
pub fn exchange(name: &str, enabled_pairs: &str, available_pairs: &str) -> ExchangeConfig {
    let mut config = ExchangeConfig::new(name);
    config.enabled = true;
    config.api.endpoints.url = NON_DEFAULT_HTTP_LINK.to_string();
    config.api.endpoints.url_secondary = NON_DEFAULT_HTTP_LINK.to_string();
    config.enabled_pairs = enabled_pairs.to_string();
    config.available_pairs = available_pairs.to_string();
    config
}

/// Same as [`exchange`] but with `enabled = false`.
pub fn disabled(name: &str) -> ExchangeConfig {
    let mut config = exchange(name, "", "");
    config.enabled = false;
    config
}

/// In-memory store holding `configs`.
pub fn store(configs: impl IntoIterator<Item = ExchangeConfig>) -> Arc<MemoryConfigStore> {
    Arc::new(MemoryConfigStore::with_exchanges(configs))
}
