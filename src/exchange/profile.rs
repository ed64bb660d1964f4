//! Per-exchange state shared by every connector.
//!
//! A connector builds its [`ExchangeProfile`] from static [`ProfileDefaults`]
//! (endpoints, pair formats, supported features, quotas) and then applies
//! the user's [`ExchangeConfig`] with [`ExchangeProfile::setup_defaults`].
//! After setup the profile keeps changing at runtime: pair reconciliation,
//! credential updates, enable toggles and proxy changes all go through it.
//!
//! Every mutator takes `&self`. Settings live behind locks so a profile can
//! be shared by the polling task and the engine at once. Config write-backs
//! hold one persist lock from the store read through the in-memory swap, so
//! concurrent write-backs never overwrite each other's fields.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use super::withdraw::WithdrawPermissions;
use crate::asset::{AssetType, AssetTypes};
use crate::config::{
    ConfigStore, CredentialsConfig, CredentialsValidatorConfig, ExchangeConfig, FeaturesConfig,
    FeaturesEnabledConfig, FeaturesSupportedConfig, NON_DEFAULT_HTTP_LINK,
    NON_DEFAULT_WEBSOCKET_LINK,
};
use crate::error::{ConfigError, Error, Result};
use crate::market::MarketDataCache;
use crate::pair::{
    any_contains_delimiter, diff_pairs, normalize_pairs, split_pair_list, CurrencyPair, PairDiff,
    PairFormat,
};
use crate::request::{Nonce, RateLimit, Requester};
use crate::websocket::Websocket;

/// Built-in settings a connector ships with.
#[derive(Debug, Clone)]
pub struct ProfileDefaults {
    pub name: String,
    pub api_url: String,
    pub api_url_secondary: String,
    pub websocket_url: String,
    pub authenticated_support: bool,
    pub pem_key_support: bool,
    pub credentials_validator: CredentialsValidatorConfig,
    pub supports: FeaturesSupportedConfig,
    pub request_format: PairFormat,
    pub config_format: PairFormat,
    pub asset_types: AssetTypes,
    pub withdraw_permissions: WithdrawPermissions,
    pub authenticated_limit: (Duration, u32),
    pub unauthenticated_limit: (Duration, u32),
}

impl ProfileDefaults {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_url: String::new(),
            api_url_secondary: String::new(),
            websocket_url: String::new(),
            authenticated_support: false,
            pem_key_support: false,
            credentials_validator: CredentialsValidatorConfig::default(),
            supports: FeaturesSupportedConfig {
                rest: true,
                ..Default::default()
            },
            request_format: PairFormat::default(),
            config_format: PairFormat::default(),
            asset_types: AssetTypes::new([AssetType::Spot]),
            withdraw_permissions: WithdrawPermissions::NONE,
            authenticated_limit: (Duration::from_secs(1), 0),
            unauthenticated_limit: (Duration::from_secs(1), 0),
        }
    }

    pub fn api_urls(mut self, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        self.api_url = primary.into();
        self.api_url_secondary = secondary.into();
        self
    }

    pub fn websocket_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_url = url.into();
        self
    }

    pub fn pair_formats(mut self, request: PairFormat, config: PairFormat) -> Self {
        self.request_format = request;
        self.config_format = config;
        self
    }

    pub fn supports(mut self, supports: FeaturesSupportedConfig) -> Self {
        self.supports = supports;
        self
    }

    pub fn asset_types(mut self, assets: AssetTypes) -> Self {
        self.asset_types = assets;
        self
    }

    pub fn withdraw_permissions(mut self, permissions: WithdrawPermissions) -> Self {
        self.withdraw_permissions = permissions;
        self
    }

    pub fn rate_limits(
        mut self,
        authenticated: (Duration, u32),
        unauthenticated: (Duration, u32),
    ) -> Self {
        self.authenticated_limit = authenticated;
        self.unauthenticated_limit = unauthenticated;
        self
    }

    pub fn authenticated(mut self, supported: bool, validator: CredentialsValidatorConfig) -> Self {
        self.authenticated_support = supported;
        self.credentials_validator = validator;
        self
    }
}

/// Resolved API endpoints and credentials.
#[derive(Debug, Clone, Default)]
pub struct ApiSettings {
    pub authenticated_support: bool,
    pub pem_key_support: bool,
    pub url: String,
    pub url_default: String,
    pub url_secondary: String,
    pub url_secondary_default: String,
    pub websocket_url: String,
    pub credentials: CredentialsConfig,
    pub credentials_validator: CredentialsValidatorConfig,
}

#[derive(Debug, Clone)]
struct Settings {
    verbose: bool,
    api: ApiSettings,
    features: FeaturesConfig,
    request_format: PairFormat,
    config_format: PairFormat,
    asset_types: AssetTypes,
    withdraw_permissions: WithdrawPermissions,
    base_currencies: Vec<String>,
    pairs_last_updated: i64,
}

#[derive(Debug, Clone, Default)]
struct PairSets {
    available: Vec<String>,
    enabled: Vec<String>,
}

impl PairSets {
    fn get(&self, enabled: bool) -> &Vec<String> {
        if enabled {
            &self.enabled
        } else {
            &self.available
        }
    }

    fn get_mut(&mut self, enabled: bool) -> &mut Vec<String> {
        if enabled {
            &mut self.enabled
        } else {
            &mut self.available
        }
    }
}

fn kind(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "available"
    }
}

/// Identical delimiter, case, separator and index.
pub fn compare_pair_formats(a: &PairFormat, b: &PairFormat) -> bool {
    a.delimiter == b.delimiter
        && a.uppercase == b.uppercase
        && a.separator == b.separator
        && a.index == b.index
}

/// Mutable state of one exchange.
pub struct ExchangeProfile {
    name: String,
    enabled: AtomicBool,
    settings: RwLock<Settings>,
    pairs: RwLock<PairSets>,
    requester: Requester,
    websocket: RwLock<Option<Arc<Websocket>>>,
    persist: Mutex<()>,
    proxy: Mutex<()>,
    nonce: Nonce,
    store: Arc<dyn ConfigStore>,
    cache: Arc<MarketDataCache>,
}

impl std::fmt::Debug for ExchangeProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeProfile")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("settings", &*self.settings.read())
            .field("pairs", &*self.pairs.read())
            .field("requester", &self.requester)
            .field("websocket", &*self.websocket.read())
            .finish_non_exhaustive()
    }
}

impl ExchangeProfile {
    pub fn new(
        defaults: ProfileDefaults,
        store: Arc<dyn ConfigStore>,
        cache: Arc<MarketDataCache>,
    ) -> Self {
        let (auth_window, auth_rate) = defaults.authenticated_limit;
        let (unauth_window, unauth_rate) = defaults.unauthenticated_limit;
        let requester = Requester::new(
            defaults.name.clone(),
            RateLimit::new(auth_window, auth_rate),
            RateLimit::new(unauth_window, unauth_rate),
        );

        let settings = Settings {
            verbose: false,
            api: ApiSettings {
                authenticated_support: defaults.authenticated_support,
                pem_key_support: defaults.pem_key_support,
                url: defaults.api_url.clone(),
                url_default: defaults.api_url,
                url_secondary: defaults.api_url_secondary.clone(),
                url_secondary_default: defaults.api_url_secondary,
                websocket_url: defaults.websocket_url,
                credentials: CredentialsConfig::default(),
                credentials_validator: defaults.credentials_validator,
            },
            features: FeaturesConfig {
                supports: defaults.supports,
                enabled: FeaturesEnabledConfig {
                    auto_pair_updates: defaults.supports.auto_pair_updates,
                    websocket: false,
                },
            },
            request_format: defaults.request_format,
            config_format: defaults.config_format,
            asset_types: defaults.asset_types,
            withdraw_permissions: defaults.withdraw_permissions,
            base_currencies: Vec::new(),
            pairs_last_updated: 0,
        };

        Self {
            name: defaults.name,
            enabled: AtomicBool::new(false),
            settings: RwLock::new(settings),
            pairs: RwLock::new(PairSets::default()),
            requester,
            websocket: RwLock::new(None),
            persist: Mutex::new(()),
            proxy: Mutex::new(()),
            nonce: Nonce::new(),
            store,
            cache,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn cache(&self) -> &Arc<MarketDataCache> {
        &self.cache
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn verbose(&self) -> bool {
        self.settings.read().verbose
    }

    fn stored_config(&self) -> Result<ExchangeConfig> {
        self.store.exchange_config(&self.name)
    }

    // ---------------------------------------------------------------------
    // Setup
    // ---------------------------------------------------------------------

    /// Apply an enabled exchange config on top of the built-in defaults.
    ///
    /// Running it again with the same config leaves the profile unchanged
    /// and reuses the existing requester and websocket.
    ///
    /// # Errors
    ///
    /// Fails when an API url is empty, when the proxy address is rejected,
    /// or when a write-back to the config store fails.
    pub fn setup_defaults(&self, config: &ExchangeConfig) -> Result<()> {
        self.set_enabled(true);
        {
            let mut settings = self.settings.write();
            settings.verbose = config.verbose;
            if let Some(bits) = config.withdraw_permissions {
                settings.withdraw_permissions = WithdrawPermissions::from_bits(bits);
            }
            let base = split_pair_list(&config.base_currencies);
            if !base.is_empty() {
                settings.base_currencies = base;
            }
        }
        self.requester.set_verbose(config.verbose);

        if config.http_timeout_ms == 0 {
            debug!(exchange = %self.name, "no HTTP timeout configured, using default");
        }
        self.set_http_timeout(Duration::from_millis(config.http_timeout_ms));
        self.set_user_agent(&config.http_user_agent);

        self.set_api_url(config)?;

        {
            let mut settings = self.settings.write();
            settings.api.authenticated_support = config.api.authenticated_support;
            settings.api.pem_key_support = config.api.pem_key_support;
            settings.api.credentials_validator = config.api.credentials_validator.clone();
        }
        let creds = &config.api.credentials;
        self.set_api_keys(
            &creds.key,
            &creds.secret,
            &creds.client_id,
            config.api.credentials_validator.requires_base64_decode_secret,
        );
        if config.api.pem_key_support {
            self.settings.write().api.credentials.pem_key = creds.pem_key.clone();
        }
        if self.authenticated_api_support() {
            if let Err(err) = self.validate_credentials() {
                warn!(exchange = %self.name, error = %err, "disabling authenticated API support");
                self.settings.write().api.authenticated_support = false;
            }
        }

        self.requester.apply_rate_limits(&config.rate_limits);

        self.set_currency_pair_format()?;
        self.set_auto_pair_defaults()?;
        self.set_asset_types()?;

        let stored = self.stored_config()?;
        {
            let mut settings = self.settings.write();
            let supports = settings.features.supports;
            if let Some(features) = stored.features {
                settings.features.enabled.auto_pair_updates =
                    supports.auto_pair_updates && features.enabled.auto_pair_updates;
                settings.features.enabled.websocket =
                    supports.websocket && features.enabled.websocket;
            }
            settings.pairs_last_updated = stored.pairs_last_updated;
        }

        {
            let mut pairs = self.pairs.write();
            pairs.available = split_pair_list(&config.available_pairs);
            pairs.enabled = split_pair_list(&config.enabled_pairs);
        }

        self.setup_websocket(config);
        self.set_client_proxy_address(&config.proxy_address)?;

        let (enabled_pairs, available_pairs) = {
            let pairs = self.pairs.read();
            (pairs.enabled.len(), pairs.available.len())
        };
        info!(
            exchange = %self.name,
            enabled_pairs,
            available_pairs,
            authenticated = self.authenticated_api_support(),
            "exchange configured"
        );
        Ok(())
    }

    fn setup_websocket(&self, config: &ExchangeConfig) {
        if !self.supports_websocket() {
            return;
        }
        let endpoint = &config.api.endpoints.websocket_url;
        let url = if endpoint.is_empty() || endpoint == NON_DEFAULT_WEBSOCKET_LINK {
            self.settings.read().api.websocket_url.clone()
        } else {
            self.settings.write().api.websocket_url = endpoint.clone();
            endpoint.clone()
        };
        let enabled = self.is_websocket_enabled();

        let mut slot = self.websocket.write();
        match slot.as_ref() {
            Some(ws) => {
                ws.set_url(url);
                ws.set_enabled(enabled);
            }
            None => {
                *slot = Some(Arc::new(Websocket::new(self.name.clone(), url, enabled)));
            }
        }
    }

    /// Adopt the configured endpoints.
    ///
    /// An endpoint still holding the example placeholder keeps the built-in
    /// default.
    pub fn set_api_url(&self, config: &ExchangeConfig) -> Result<()> {
        let endpoints = &config.api.endpoints;
        if endpoints.url.is_empty() {
            return Err(ConfigError::MissingField { field: "api.endpoints.url" }.into());
        }
        if endpoints.url_secondary.is_empty() {
            return Err(ConfigError::MissingField {
                field: "api.endpoints.url_secondary",
            }
            .into());
        }
        let mut settings = self.settings.write();
        if endpoints.url != NON_DEFAULT_HTTP_LINK {
            settings.api.url.clone_from(&endpoints.url);
        }
        if endpoints.url_secondary != NON_DEFAULT_HTTP_LINK {
            settings.api.url_secondary.clone_from(&endpoints.url_secondary);
        }
        Ok(())
    }

    /// Store credentials. Ignored when authenticated support is off.
    ///
    /// With `base64_decode` set, a secret that does not decode disables
    /// authenticated support.
    pub fn set_api_keys(&self, key: &str, secret: &str, client_id: &str, base64_decode: bool) {
        let mut settings = self.settings.write();
        if !settings.api.authenticated_support {
            return;
        }
        settings.api.credentials.key = key.to_string();
        settings.api.credentials.client_id = client_id.to_string();

        if !base64_decode {
            settings.api.credentials.secret = secret.to_string();
            return;
        }
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(secret)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok());
        match decoded {
            Some(secret) => settings.api.credentials.secret = secret,
            None => {
                settings.api.authenticated_support = false;
                settings.api.credentials.secret.clear();
                warn!(
                    exchange = %self.name,
                    "unable to base64 decode secret key, disabling authenticated API support"
                );
            }
        }
    }

    /// Check the stored credentials against the validator.
    pub fn validate_credentials(&self) -> Result<()> {
        let settings = self.settings.read();
        let creds = &settings.api.credentials;
        let rules = &settings.api.credentials_validator;
        let fail = |reason: &str| {
            Err(Error::Credentials {
                exchange: self.name.clone(),
                reason: reason.to_string(),
            })
        };
        if creds.key.is_empty() {
            return fail("API key is not set");
        }
        if rules.requires_pem {
            if creds.pem_key.is_empty() {
                return fail("PEM key is required");
            }
        } else if creds.secret.is_empty() {
            return fail("API secret is not set");
        }
        if rules.requires_client_id && creds.client_id.is_empty() {
            return fail("client id is required");
        }
        Ok(())
    }

    /// Reconcile the stored pair formats with the built-in ones.
    ///
    /// A missing or differing stored format is overwritten with the
    /// built-in one; a matching one is adopted.
    pub fn set_currency_pair_format(&self) -> Result<()> {
        let _persist = self.persist.lock();
        let mut stored = self.stored_config()?;
        let mut update = false;
        {
            let mut guard = self.settings.write();
            let settings = &mut *guard;
            for (current, persisted) in [
                (&mut settings.request_format, &mut stored.request_pair_format),
                (&mut settings.config_format, &mut stored.config_pair_format),
            ] {
                match persisted {
                    Some(format) if compare_pair_formats(current, format) => {
                        *current = format.clone();
                    }
                    _ => {
                        *persisted = Some(current.clone());
                        update = true;
                    }
                }
            }
        }
        if update {
            debug!(exchange = %self.name, "writing pair formats to config");
            self.store.update_exchange_config(stored)?;
        }
        Ok(())
    }

    /// Correct the stored auto-pair-update support flag.
    ///
    /// Newly gained support resets the last-update stamp so the next run
    /// refreshes pairs; without support, a never-stamped config is stamped
    /// now.
    pub fn set_auto_pair_defaults(&self) -> Result<()> {
        let _persist = self.persist.lock();
        let mut stored = self.stored_config()?;
        let supports = self.settings.read().features.supports;
        let mut update = false;

        let features = stored.features.get_or_insert_with(|| {
            update = true;
            FeaturesConfig {
                supports,
                enabled: FeaturesEnabledConfig {
                    auto_pair_updates: supports.auto_pair_updates,
                    websocket: false,
                },
            }
        });

        if supports.auto_pair_updates {
            if !features.supports.auto_pair_updates {
                features.supports.auto_pair_updates = true;
                stored.pairs_last_updated = 0;
                update = true;
            }
        } else if stored.pairs_last_updated == 0 {
            stored.pairs_last_updated = Utc::now().timestamp();
            update = true;
        }

        if update {
            let stamp = stored.pairs_last_updated;
            self.store.update_exchange_config(stored)?;
            self.settings.write().pairs_last_updated = stamp;
        }
        Ok(())
    }

    /// Write the built-in asset types back to the config.
    pub fn set_asset_types(&self) -> Result<()> {
        let _persist = self.persist.lock();
        let mut stored = self.stored_config()?;
        let joined = self.settings.read().asset_types.join(",");
        if stored.asset_types != joined {
            stored.asset_types = joined;
            self.store.update_exchange_config(stored)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Pairs
    // ---------------------------------------------------------------------

    /// Stored enabled pair strings, in config format.
    pub fn enabled_pair_strings(&self) -> Vec<String> {
        self.pairs.read().enabled.clone()
    }

    /// Stored available pair strings, in config format.
    pub fn available_pair_strings(&self) -> Vec<String> {
        self.pairs.read().available.clone()
    }

    pub fn enabled_pairs(&self) -> Vec<CurrencyPair> {
        let format = self.config_format();
        format.parse_pairs(&self.pairs.read().enabled)
    }

    pub fn available_pairs(&self) -> Vec<CurrencyPair> {
        let format = self.config_format();
        format.parse_pairs(&self.pairs.read().available)
    }

    pub fn supports_pair(&self, pair: &CurrencyPair, enabled_only: bool) -> bool {
        let pairs = if enabled_only {
            self.enabled_pairs()
        } else {
            self.available_pairs()
        };
        pairs.contains(pair)
    }

    /// Replace one pair set with `pairs` and persist it.
    pub fn set_pairs(&self, pairs: &[CurrencyPair], enabled: bool) -> Result<()> {
        if pairs.is_empty() {
            return Err(ConfigError::EmptyPairs {
                exchange: self.name.clone(),
                operation: "set_pairs",
            }
            .into());
        }
        let format = self.config_format();
        let rendered: Vec<String> = pairs.iter().map(|p| format.format(p)).collect();

        let _persist = self.persist.lock();
        let mut stored = self.stored_config()?;
        if enabled {
            stored.enabled_pairs = rendered.join(",");
        } else {
            stored.available_pairs = rendered.join(",");
        }
        self.store.update_exchange_config(stored)?;
        *self.pairs.write().get_mut(enabled) = rendered;
        Ok(())
    }

    /// Reconcile one pair set with a freshly fetched product list.
    ///
    /// Products are uppercased and empty entries dropped. The set is
    /// persisted and replaced when `force` is set or the lists differ;
    /// otherwise nothing is written. Returns the additions and removals
    /// relative to the previous set.
    ///
    /// # Errors
    ///
    /// Fails on an empty product list or when the config write fails. On
    /// failure the in-memory set is left untouched.
    ///
    /// Concurrent calls are serialized from the config read through the
    /// in-memory swap.
    pub fn update_pairs<S: AsRef<str>>(
        &self,
        products: &[S],
        enabled: bool,
        force: bool,
    ) -> Result<PairDiff> {
        let products = normalize_pairs(products);
        if products.is_empty() {
            return Err(ConfigError::EmptyPairs {
                exchange: self.name.clone(),
                operation: "update_pairs",
            }
            .into());
        }

        let _persist = self.persist.lock();
        let known = self.pairs.read().get(enabled).clone();
        let diff = diff_pairs(&known, &products);
        if !force && diff.is_empty() {
            return Ok(diff);
        }

        if force {
            info!(exchange = %self.name, kind = kind(enabled), "forced update of pairs");
        } else {
            if !diff.new_pairs.is_empty() {
                info!(
                    exchange = %self.name,
                    kind = kind(enabled),
                    new = ?diff.new_pairs,
                    "updating pairs"
                );
            }
            if !diff.removed_pairs.is_empty() {
                info!(
                    exchange = %self.name,
                    kind = kind(enabled),
                    removed = ?diff.removed_pairs,
                    "updating pairs"
                );
            }
        }

        let now = Utc::now().timestamp();
        let mut stored = self.stored_config()?;
        let joined = products.join(",");
        if enabled {
            stored.enabled_pairs = joined;
        } else {
            stored.available_pairs = joined;
        }
        stored.pairs_last_updated = now;
        self.store.update_exchange_config(stored)?;

        *self.pairs.write().get_mut(enabled) = products;
        self.settings.write().pairs_last_updated = now;
        Ok(diff)
    }

    /// One-time upgrade of pair sets stored without a delimiter.
    ///
    /// When no stored enabled or no stored available pair contains the
    /// config-format delimiter, the enabled set is reset to `default_pair`
    /// and `true` is returned; the caller should then run a forced
    /// tradable-pair update. Formats without a delimiter never migrate.
    pub fn migrate_pair_format(&self, default_pair: &str) -> Result<bool> {
        let delimiter = self.config_format().delimiter;
        if delimiter.is_empty() {
            return Ok(false);
        }
        let needs_upgrade = {
            let pairs = self.pairs.read();
            !any_contains_delimiter(&pairs.enabled, &delimiter)
                || !any_contains_delimiter(&pairs.available, &delimiter)
        };
        if !needs_upgrade {
            return Ok(false);
        }

        warn!(
            exchange = %self.name,
            default_pair,
            "available pairs reset due to config upgrade, please enable the ones you would like again"
        );
        self.update_pairs(&[default_pair], true, true)?;
        Ok(true)
    }

    /// Spell `pair` the way the exchange expects it in requests.
    pub fn format_exchange_pair(&self, pair: &CurrencyPair) -> String {
        self.settings.read().request_format.format(pair)
    }

    /// Spell several pairs joined by the request separator.
    pub fn format_exchange_pairs(&self, pairs: &[CurrencyPair]) -> String {
        self.settings.read().request_format.format_many(pairs)
    }

    pub fn request_format(&self) -> PairFormat {
        self.settings.read().request_format.clone()
    }

    pub fn config_format(&self) -> PairFormat {
        self.settings.read().config_format.clone()
    }

    pub fn base_currencies(&self) -> Vec<String> {
        self.settings.read().base_currencies.clone()
    }

    pub fn asset_types(&self) -> AssetTypes {
        self.settings.read().asset_types.clone()
    }

    pub fn last_pairs_update_time(&self) -> i64 {
        self.settings.read().pairs_last_updated
    }

    // ---------------------------------------------------------------------
    // Features and API
    // ---------------------------------------------------------------------

    pub fn features(&self) -> FeaturesConfig {
        self.settings.read().features
    }

    pub fn supports_rest(&self) -> bool {
        self.features().supports.rest
    }

    pub fn supports_websocket(&self) -> bool {
        self.features().supports.websocket
    }

    pub fn supports_auto_pair_updates(&self) -> bool {
        self.features().supports.auto_pair_updates
    }

    pub fn supports_rest_ticker_batch_updates(&self) -> bool {
        self.features().supports.rest_ticker_batching
    }

    pub fn is_auto_pair_updates_enabled(&self) -> bool {
        self.features().enabled.auto_pair_updates
    }

    pub fn is_websocket_enabled(&self) -> bool {
        self.features().enabled.websocket
    }

    pub fn authenticated_api_support(&self) -> bool {
        self.settings.read().api.authenticated_support
    }

    pub fn api(&self) -> ApiSettings {
        self.settings.read().api.clone()
    }

    pub fn api_url(&self) -> String {
        self.settings.read().api.url.clone()
    }

    pub fn api_url_secondary(&self) -> String {
        self.settings.read().api.url_secondary.clone()
    }

    pub fn credentials(&self) -> CredentialsConfig {
        self.settings.read().api.credentials.clone()
    }

    pub fn withdraw_permissions(&self) -> WithdrawPermissions {
        self.settings.read().withdraw_permissions
    }

    pub fn supports_withdraw_permissions(&self, requested: WithdrawPermissions) -> bool {
        self.withdraw_permissions().supports(requested)
    }

    pub fn format_withdraw_permissions(&self) -> String {
        self.withdraw_permissions().to_string()
    }

    // ---------------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------------

    pub fn websocket(&self) -> Option<Arc<Websocket>> {
        self.websocket.read().clone()
    }

    pub fn user_agent(&self) -> String {
        self.requester.user_agent()
    }

    pub fn set_user_agent(&self, agent: &str) {
        self.requester.set_user_agent(agent);
    }

    pub fn http_timeout(&self) -> Duration {
        self.requester.timeout()
    }

    /// Zero restores the default timeout.
    pub fn set_http_timeout(&self, timeout: Duration) {
        self.requester.set_timeout(timeout);
    }

    /// Route HTTP and websocket traffic through `address`.
    ///
    /// An empty address, or the one already installed, is a no-op. Both the
    /// HTTP client and the websocket proxy are prepared first and committed
    /// together; if either is rejected neither changes. Concurrent calls
    /// apply one after the other.
    pub fn set_client_proxy_address(&self, address: &str) -> Result<()> {
        if address.is_empty() {
            return Ok(());
        }
        let proxy = Url::parse(address).map_err(|e| {
            Error::Proxy(format!("{}: invalid proxy address {address}: {e}", self.name))
        })?;

        // Held through both commits so the two transports never diverge.
        let _proxy = self.proxy.lock();
        if self.requester.proxy().as_ref() == Some(&proxy) {
            return Ok(());
        }

        let client = self.requester.prepare_proxy(&proxy)?;
        let websocket = self.websocket();
        if let Some(ws) = &websocket {
            ws.validate_proxy(&proxy)?;
        }

        self.requester.commit_proxy(proxy.clone(), client);
        if let Some(ws) = websocket {
            ws.commit_proxy(proxy.clone());
        }
        info!(exchange = %self.name, proxy = %proxy, "proxy address set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;

    fn defaults() -> ProfileDefaults {
        ProfileDefaults::new("ZB")
            .api_urls("https://api.zb.com", "https://trade.zb.com")
            .websocket_url("wss://api.zb.com/websocket")
            .pair_formats(PairFormat::new("_", false), PairFormat::new("_", true))
            .authenticated(true, CredentialsValidatorConfig::default())
    }

    fn config() -> ExchangeConfig {
        let mut cfg = ExchangeConfig::new("ZB");
        cfg.enabled = true;
        cfg.api.authenticated_support = true;
        cfg.api.endpoints.url = NON_DEFAULT_HTTP_LINK.into();
        cfg.api.endpoints.url_secondary = NON_DEFAULT_HTTP_LINK.into();
        cfg.enabled_pairs = "BTC_USDT".into();
        cfg.available_pairs = "BTC_USDT,ETH_USDT".into();
        cfg
    }

    fn profile_with(cfg: ExchangeConfig) -> (ExchangeProfile, Arc<MemoryConfigStore>) {
        let store = Arc::new(MemoryConfigStore::with_exchanges([cfg]));
        let profile = ExchangeProfile::new(
            defaults(),
            Arc::clone(&store) as Arc<dyn ConfigStore>,
            Arc::new(MarketDataCache::new()),
        );
        (profile, store)
    }

    #[test]
    fn placeholder_urls_keep_defaults() {
        let (profile, _) = profile_with(config());
        profile.setup_defaults(&config()).unwrap();
        assert_eq!(profile.api_url(), "https://api.zb.com");
        assert_eq!(profile.api_url_secondary(), "https://trade.zb.com");
    }

    #[test]
    fn configured_urls_override_defaults() {
        let mut cfg = config();
        cfg.api.endpoints.url = "https://mirror.example".into();
        let (profile, _) = profile_with(cfg.clone());
        profile.setup_defaults(&cfg).unwrap();
        assert_eq!(profile.api_url(), "https://mirror.example");
        assert_eq!(profile.api_url_secondary(), "https://trade.zb.com");
    }

    #[test]
    fn empty_url_fails_setup() {
        let mut cfg = config();
        cfg.api.endpoints.url_secondary.clear();
        let (profile, _) = profile_with(cfg.clone());
        let err = profile.setup_defaults(&cfg).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingField { .. })));
    }

    #[test]
    fn bad_base64_secret_disables_authentication() {
        let (profile, _) = profile_with(config());
        profile.set_api_keys("key", "!!not base64!!", "", true);
        assert!(!profile.authenticated_api_support());
        assert!(profile.credentials().secret.is_empty());
    }

    #[test]
    fn base64_secret_is_decoded() {
        let (profile, _) = profile_with(config());
        profile.set_api_keys("key", "c2VjcmV0", "", true);
        assert!(profile.authenticated_api_support());
        assert_eq!(profile.credentials().secret, "secret");
    }

    #[test]
    fn keys_ignored_without_authenticated_support() {
        let (profile, _) = profile_with(config());
        profile.settings.write().api.authenticated_support = false;
        profile.set_api_keys("key", "secret", "", false);
        assert!(profile.credentials().key.is_empty());
    }

    #[test]
    fn missing_credentials_disable_authentication_during_setup() {
        let (profile, _) = profile_with(config());
        profile.setup_defaults(&config()).unwrap();
        assert!(!profile.authenticated_api_support());
    }

    #[test]
    fn setup_writes_formats_and_assets_back() {
        let (profile, store) = profile_with(config());
        profile.setup_defaults(&config()).unwrap();

        let stored = store.exchange_config("ZB").unwrap();
        assert_eq!(stored.request_pair_format, Some(PairFormat::new("_", false)));
        assert_eq!(stored.config_pair_format, Some(PairFormat::new("_", true)));
        assert_eq!(stored.asset_types, "Spot");
        assert!(stored.features.is_some());
        assert_ne!(stored.pairs_last_updated, 0);
    }

    #[test]
    fn differing_stored_format_is_overwritten() {
        let mut cfg = config();
        cfg.request_pair_format = Some(PairFormat::new("-", true));
        let (profile, store) = profile_with(cfg);
        profile.set_currency_pair_format().unwrap();

        let stored = store.exchange_config("ZB").unwrap();
        assert_eq!(stored.request_pair_format, Some(PairFormat::new("_", false)));
        assert_eq!(profile.request_format(), PairFormat::new("_", false));
    }

    #[test]
    fn setup_is_idempotent() {
        let (profile, store) = profile_with(config());
        profile.setup_defaults(&config()).unwrap();
        let writes = store.write_count();
        let ws = profile.websocket();

        profile.setup_defaults(&config()).unwrap();

        assert_eq!(store.write_count(), writes);
        assert_eq!(profile.enabled_pair_strings(), vec!["BTC_USDT"]);
        match (ws, profile.websocket()) {
            (Some(a), Some(b)) => assert!(Arc::ptr_eq(&a, &b)),
            (None, None) => {}
            _ => panic!("websocket changed across setups"),
        }
    }

    #[test]
    fn auto_pair_support_resets_last_update() {
        let mut cfg = config();
        cfg.pairs_last_updated = 1_500_000_000;
        cfg.features = Some(FeaturesConfig::default());
        let store = Arc::new(MemoryConfigStore::with_exchanges([cfg]));
        let profile = ExchangeProfile::new(
            defaults().supports(FeaturesSupportedConfig {
                rest: true,
                auto_pair_updates: true,
                ..Default::default()
            }),
            Arc::clone(&store) as Arc<dyn ConfigStore>,
            Arc::new(MarketDataCache::new()),
        );

        profile.set_auto_pair_defaults().unwrap();

        let stored = store.exchange_config("ZB").unwrap();
        assert!(stored.features.unwrap().supports.auto_pair_updates);
        assert_eq!(stored.pairs_last_updated, 0);
    }

    #[test]
    fn set_pairs_rejects_empty_and_persists_formatted() {
        let (profile, store) = profile_with(config());
        profile.setup_defaults(&config()).unwrap();

        assert!(profile.set_pairs(&[], true).is_err());

        profile
            .set_pairs(&[CurrencyPair::new("ltc", "btc")], true)
            .unwrap();
        assert_eq!(profile.enabled_pair_strings(), vec!["LTC_BTC"]);
        assert_eq!(store.exchange_config("ZB").unwrap().enabled_pairs, "LTC_BTC");
    }

    #[test]
    fn supports_pair_checks_the_right_set() {
        let (profile, _) = profile_with(config());
        profile.setup_defaults(&config()).unwrap();
        let eth = CurrencyPair::new("ETH", "USDT");
        assert!(profile.supports_pair(&eth, false));
        assert!(!profile.supports_pair(&eth, true));
    }

    #[test]
    fn exchange_pair_uses_request_format() {
        let (profile, _) = profile_with(config());
        profile.setup_defaults(&config()).unwrap();
        let pairs = profile.enabled_pairs();
        assert_eq!(profile.format_exchange_pair(&pairs[0]), "btc_usdt");
    }

    #[test]
    fn migration_collapses_undelimited_pairs() {
        let mut cfg = config();
        cfg.enabled_pairs = "BTCUSDT,ETHUSDT".into();
        let (profile, store) = profile_with(cfg.clone());
        profile.setup_defaults(&cfg).unwrap();

        assert!(profile.migrate_pair_format("BTC_USDT").unwrap());
        assert_eq!(profile.enabled_pair_strings(), vec!["BTC_USDT"]);
        assert_eq!(store.exchange_config("ZB").unwrap().enabled_pairs, "BTC_USDT");

        assert!(!profile.migrate_pair_format("BTC_USDT").unwrap());
    }

    #[test]
    fn failed_persist_leaves_pairs_untouched() {
        let (profile, store) = profile_with(config());
        profile.setup_defaults(&config()).unwrap();
        store.set_fail_updates(true);

        assert!(profile.update_pairs(&["LTC_USDT"], false, false).is_err());
        assert_eq!(profile.available_pair_strings(), vec!["BTC_USDT", "ETH_USDT"]);
    }

    #[test]
    fn update_pairs_rejects_all_empty_input() {
        let (profile, store) = profile_with(config());
        let empty: [&str; 0] = [];
        assert!(profile.update_pairs(&empty, false, true).is_err());
        assert!(profile.update_pairs(&["", " "], false, true).is_err());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn withdraw_permission_override() {
        let mut cfg = config();
        cfg.withdraw_permissions = Some(WithdrawPermissions::AUTO_WITHDRAW_CRYPTO.bits());
        let (profile, _) = profile_with(cfg.clone());
        assert_eq!(profile.format_withdraw_permissions(), "NONE, WEBSITE ONLY");

        profile.setup_defaults(&cfg).unwrap();
        assert!(profile.supports_withdraw_permissions(WithdrawPermissions::AUTO_WITHDRAW_CRYPTO));
        assert_eq!(profile.format_withdraw_permissions(), "AUTO WITHDRAW CRYPTO");
    }

    #[test]
    fn empty_proxy_address_is_noop() {
        let (profile, _) = profile_with(config());
        profile.set_client_proxy_address("").unwrap();
        assert!(profile.requester().proxy().is_none());
    }

    #[test]
    fn compare_formats_checks_every_field() {
        let a = PairFormat::new("-", true);
        assert!(compare_pair_formats(&a, &a.clone()));
        assert!(!compare_pair_formats(&a, &a.clone().with_separator(",")));
        assert!(!compare_pair_formats(&a, &PairFormat::new("-", false)));
    }
}
