//! [`ConfigStore`] implementations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ConfigStore, CredentialsConfig, ExchangeConfig, LoggingConfig};
use crate::error::{ConfigError, Error, Result};

/// Top-level layout of a config file.
///
/// ```toml
/// [logging]
/// level = "info"
/// format = "pretty"
///
/// [[exchanges]]
/// name = "ZB"
/// enabled = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        let mut seen = Vec::with_capacity(self.exchanges.len());
        for exchange in &self.exchanges {
            if exchange.name.trim().is_empty() {
                return Err(ConfigError::MissingField { field: "name" }.into());
            }
            let key = exchange.name.to_lowercase();
            if seen.contains(&key) {
                return Err(ConfigError::InvalidValue {
                    field: "name",
                    reason: format!("exchange {} is configured twice", exchange.name),
                }
                .into());
            }
            seen.push(key);
        }
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut ExchangeConfig> {
        self.exchanges
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

/// In-memory store.
///
/// Counts successful writes so callers can assert on persistence behavior.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    exchanges: RwLock<HashMap<String, ExchangeConfig>>,
    writes: AtomicUsize,
    fail_updates: AtomicBool,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exchanges(configs: impl IntoIterator<Item = ExchangeConfig>) -> Self {
        let store = Self::new();
        for config in configs {
            store.insert(config);
        }
        store
    }

    /// Add or replace a config without counting it as a write.
    pub fn insert(&self, config: ExchangeConfig) {
        self.exchanges
            .write()
            .insert(config.name.to_lowercase(), config);
    }

    /// Number of successful `update_exchange_config` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent update fail with an IO error.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .exchanges
            .read()
            .values()
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }
}

impl ConfigStore for MemoryConfigStore {
    fn exchange_config(&self, name: &str) -> Result<ExchangeConfig> {
        self.exchanges
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| ConfigError::ExchangeNotFound(name.to_string()).into())
    }

    fn update_exchange_config(&self, config: ExchangeConfig) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(ConfigError::WriteFile(std::io::Error::other("updates disabled")).into());
        }
        let key = config.name.to_lowercase();
        let mut exchanges = self.exchanges.write();
        match exchanges.get_mut(&key) {
            Some(slot) => *slot = config,
            None => return Err(ConfigError::ExchangeNotFound(config.name).into()),
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Credential values taken from the environment for one exchange.
#[derive(Clone, Default)]
struct CredentialOverride {
    key: Option<String>,
    secret: Option<String>,
    client_id: Option<String>,
}

impl std::fmt::Debug for CredentialOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialOverride")
            .field("key", &self.key.is_some())
            .field("secret", &self.secret.is_some())
            .field("client_id", &self.client_id.is_some())
            .finish()
    }
}

impl CredentialOverride {
    fn from_env(exchange: &str) -> Option<Self> {
        let prefix = env_prefix(exchange);
        let read = |suffix: &str| {
            std::env::var(format!("{prefix}_{suffix}"))
                .ok()
                .filter(|v| !v.is_empty())
        };
        let found = Self {
            key: read("API_KEY"),
            secret: read("API_SECRET"),
            client_id: read("CLIENT_ID"),
        };
        if found.key.is_none() && found.secret.is_none() && found.client_id.is_none() {
            None
        } else {
            Some(found)
        }
    }

    fn apply(&self, creds: &mut CredentialsConfig) {
        if let Some(key) = &self.key {
            creds.key.clone_from(key);
        }
        if let Some(secret) = &self.secret {
            creds.secret.clone_from(secret);
        }
        if let Some(client_id) = &self.client_id {
            creds.client_id.clone_from(client_id);
        }
    }

    /// Put the file's own values back for every overridden field.
    fn restore(&self, creds: &mut CredentialsConfig, stored: &CredentialsConfig) {
        if self.key.is_some() {
            creds.key.clone_from(&stored.key);
        }
        if self.secret.is_some() {
            creds.secret.clone_from(&stored.secret);
        }
        if self.client_id.is_some() {
            creds.client_id.clone_from(&stored.client_id);
        }
    }
}

/// `"Coinbase Pro"` -> `"COINBASE_PRO"`.
fn env_prefix(exchange: &str) -> String {
    exchange
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// File-backed store.
///
/// Credentials can be supplied through `<NAME>_API_KEY`, `<NAME>_API_SECRET`
/// and `<NAME>_CLIENT_ID` (a `.env` file is honored). Values from the
/// environment are served to readers but never written back to the file.
#[derive(Debug)]
pub struct TomlConfigStore {
    path: PathBuf,
    config: RwLock<Config>,
    overrides: HashMap<String, CredentialOverride>,
}

impl TomlConfigStore {
    /// Load a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or names
    /// the same exchange twice.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(ConfigError::ReadFile)?;

        if dotenvy::dotenv().is_ok() {
            debug!("loaded .env file");
        }

        let config = Config::parse_toml(&content)?;
        let overrides: HashMap<_, _> = config
            .exchanges
            .iter()
            .filter_map(|e| {
                CredentialOverride::from_env(&e.name).map(|o| (e.name.to_lowercase(), o))
            })
            .collect();
        for name in overrides.keys() {
            info!(exchange = %name, "applying credential overrides from environment");
        }

        Ok(Self {
            path,
            config: RwLock::new(config),
            overrides,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn logging(&self) -> LoggingConfig {
        self.config.read().logging.clone()
    }

    pub fn exchange_names(&self) -> Vec<String> {
        self.config
            .read()
            .exchanges
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    fn persist(&self, config: &Config) -> Result<()> {
        let rendered = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
        std::fs::write(&self.path, rendered).map_err(ConfigError::WriteFile)?;
        debug!(path = %self.path.display(), "config written");
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn exchange_config(&self, name: &str) -> Result<ExchangeConfig> {
        let mut exchange = self
            .config
            .read()
            .find(name)
            .cloned()
            .ok_or_else(|| Error::from(ConfigError::ExchangeNotFound(name.to_string())))?;
        if let Some(o) = self.overrides.get(&name.to_lowercase()) {
            o.apply(&mut exchange.api.credentials);
        }
        Ok(exchange)
    }

    fn update_exchange_config(&self, mut exchange: ExchangeConfig) -> Result<()> {
        let mut config = self.config.write();
        let key = exchange.name.to_lowercase();
        let slot = config
            .find_mut(&key)
            .ok_or_else(|| Error::from(ConfigError::ExchangeNotFound(exchange.name.clone())))?;
        if let Some(o) = self.overrides.get(&key) {
            o.restore(&mut exchange.api.credentials, &slot.api.credentials);
        }
        let previous = std::mem::replace(slot, exchange);

        if let Err(err) = self.persist(&config) {
            if let Some(slot) = config.find_mut(&key) {
                *slot = previous;
            }
            return Err(err);
        }
        Ok(())
    }
}
