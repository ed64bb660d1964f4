//! Exchange configuration as consumed by the core.
//!
//! The core never owns the persisted config format. It reads one
//! [`ExchangeConfig`] per exchange through the [`ConfigStore`] trait and
//! writes back reconciled pair lists and corrected feature defaults through
//! the same trait.
//!
//! Two stores ship with the crate: [`MemoryConfigStore`] for embedding and
//! tests, and [`TomlConfigStore`] which keeps a TOML file in sync and applies
//! credential overrides from the environment.
//!
//! # Example
//!
//! ```no_run
//! use venuekit::config::{ConfigStore, TomlConfigStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TomlConfigStore::load("exchanges.toml")?;
//!     store.logging().init();
//!     let zb = store.exchange_config("ZB")?;
//!     println!("{} enabled: {}", zb.name, zb.enabled);
//!     Ok(())
//! }
//! ```

mod logging;
mod store;

pub use logging::LoggingConfig;
pub use store::{Config, MemoryConfigStore, TomlConfigStore};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pair::PairFormat;

/// Placeholder shipped in example configs for endpoints the user has not
/// overridden. An endpoint holding it keeps the exchange's built-in default.
pub const NON_DEFAULT_HTTP_LINK: &str = "NON_DEFAULT_HTTP_LINK_TO_CONFIG_EXAMPLE";

/// Placeholder for a websocket endpoint the user has not overridden.
pub const NON_DEFAULT_WEBSOCKET_LINK: &str = "NON_DEFAULT_HTTP_LINK_TO_WEBSOCKET_EXCHANGE";

/// Synchronous key-value store of exchange configs, keyed by exchange name.
pub trait ConfigStore: Send + Sync {
    /// Look up the config for `name` (case-insensitive).
    fn exchange_config(&self, name: &str) -> Result<ExchangeConfig>;

    /// Replace the stored config that has the same name.
    fn update_exchange_config(&self, config: ExchangeConfig) -> Result<()>;
}

/// Everything the core reads for one exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub verbose: bool,
    /// Zero selects the default timeout.
    #[serde(default)]
    pub http_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_user_agent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy_address: String,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,

    /// Comma-joined, in the config pair format.
    #[serde(default)]
    pub available_pairs: String,
    /// Comma-joined, in the config pair format.
    #[serde(default)]
    pub enabled_pairs: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_currencies: String,
    #[serde(default)]
    pub asset_types: String,
    /// Unix seconds; zero means never updated.
    #[serde(default)]
    pub pairs_last_updated: i64,

    #[serde(default)]
    pub api: ApiConfig,
    pub config_pair_format: Option<PairFormat>,
    pub request_pair_format: Option<PairFormat>,
    pub features: Option<FeaturesConfig>,
    /// Overrides the exchange's built-in withdrawal-permission bitmask.
    pub withdraw_permissions: Option<u32>,
}

impl ExchangeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// API endpoints, credentials and credential requirements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub authenticated_support: bool,
    #[serde(default)]
    pub pem_key_support: bool,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub credentials_validator: CredentialsValidatorConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub url_secondary: String,
    #[serde(default)]
    pub websocket_url: String,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pem_key: String,
}

// Secrets stay out of logs.
impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("key", &redact(&self.key))
            .field("secret", &redact(&self.secret))
            .field("client_id", &self.client_id)
            .field("pem_key", &redact(&self.pem_key))
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsValidatorConfig {
    #[serde(default)]
    pub requires_pem: bool,
    #[serde(default)]
    pub requires_client_id: bool,
    #[serde(default)]
    pub requires_base64_decode_secret: bool,
}

/// Supported and user-enabled features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub supports: FeaturesSupportedConfig,
    #[serde(default)]
    pub enabled: FeaturesEnabledConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesSupportedConfig {
    #[serde(default)]
    pub rest: bool,
    #[serde(default)]
    pub websocket: bool,
    #[serde(default)]
    pub auto_pair_updates: bool,
    #[serde(default)]
    pub rest_ticker_batching: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturesEnabledConfig {
    #[serde(default)]
    pub auto_pair_updates: bool,
    #[serde(default)]
    pub websocket: bool,
}

/// Per-bucket overrides; a missing bucket keeps the exchange default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    pub authenticated: Option<RateLimitConfig>,
    pub unauthenticated: Option<RateLimitConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub duration_ms: u64,
    /// Requests per window; zero disables limiting.
    pub rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_exchange_table() {
        let cfg: ExchangeConfig = toml::from_str(
            r#"
            name = "ZB"
            enabled = true
            enabled_pairs = "BTC_USDT"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.name, "ZB");
        assert!(cfg.enabled);
        assert!(cfg.features.is_none());
        assert!(cfg.request_pair_format.is_none());
        assert_eq!(cfg.http_timeout_ms, 0);
    }

    #[test]
    fn parses_nested_tables() {
        let cfg: ExchangeConfig = toml::from_str(
            r#"
            name = "Binance"
            asset_types = "Spot"

            [api]
            authenticated_support = true
            [api.endpoints]
            url = "https://api.binance.com"
            url_secondary = "NON_DEFAULT_HTTP_LINK_TO_CONFIG_EXAMPLE"
            [api.credentials]
            key = "k"
            secret = "s"

            [request_pair_format]
            uppercase = true

            [features.supports]
            rest = true
            auto_pair_updates = true

            [rate_limits.authenticated]
            duration_ms = 1000
            rate = 20
            "#,
        )
        .unwrap();

        assert!(cfg.api.authenticated_support);
        assert_eq!(cfg.api.endpoints.url_secondary, NON_DEFAULT_HTTP_LINK);
        assert!(cfg.request_pair_format.unwrap().uppercase);
        assert!(cfg.features.unwrap().supports.auto_pair_updates);
        assert_eq!(cfg.rate_limits.authenticated.unwrap().rate, 20);
        assert!(cfg.rate_limits.unauthenticated.is_none());
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = CredentialsConfig {
            key: "abc".into(),
            secret: "topsecret".into(),
            ..Default::default()
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("<redacted>"));
    }
}
