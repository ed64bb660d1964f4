//! The uniform exchange contract.
//!
//! Every connector implements [`Exchange`] on top of an [`ExchangeProfile`].
//! The trait supplies the parts that are the same everywhere: setup,
//! cache-first market-data reads, pair reconciliation, withdrawal-permission
//! queries and the polling loop. A connector only has to implement the
//! venue calls.
//!
//! Operations a venue lacks return [`Error::NotSupported`]. Operations the
//! venue offers but the connector has not wired up yet return
//! [`Error::NotYetImplemented`], which is what the defaults here do.

mod fee;
mod profile;
mod registry;
mod types;
mod withdraw;

pub use fee::{BankTransactionType, FeeBuilder, FeeType};
pub use profile::{compare_pair_formats, ApiSettings, ExchangeProfile, ProfileDefaults};
pub use registry::{ExchangeConstructor, ExchangeRegistry};
pub use types::{
    AccountCurrencyInfo, AccountInfo, CancelAllOrdersResponse, CryptoWithdrawRequest,
    FiatWithdrawRequest, FundHistory, ModifyOrder, OrderCancellation, OrderDetail, OrderSide,
    OrderType, SubmitOrder, SubmitOrderResponse, TradeHistory,
};
pub use withdraw::WithdrawPermissions;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::asset::AssetType;
use crate::config::ExchangeConfig;
use crate::error::{Error, Result};
use crate::market::{Orderbook, Ticker};
use crate::pair::{CurrencyPair, PairDiff};
use crate::websocket::Websocket;

/// Interval between ticker polls in the default run loop.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(10);

/// Contract between the engine and one exchange connector.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn profile(&self) -> &ExchangeProfile;

    fn name(&self) -> &str {
        self.profile().name()
    }

    /// Apply `config`. A disabled config only marks the exchange disabled.
    ///
    /// On error the caller should treat the exchange as disabled.
    async fn setup(&self, config: &ExchangeConfig) -> Result<()> {
        if !config.enabled {
            self.profile().set_enabled(false);
            debug!(exchange = %self.name(), "exchange disabled in config");
            return Ok(());
        }
        self.profile().setup_defaults(config)
    }

    fn is_enabled(&self) -> bool {
        self.profile().is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.profile().set_enabled(enabled);
    }

    /// Pair the enabled set collapses to when stored pairs predate the
    /// current delimiter. `None` disables the migration.
    fn default_pair(&self) -> Option<&str> {
        None
    }

    fn polling_interval(&self) -> Duration {
        DEFAULT_POLLING_INTERVAL
    }

    // ---------------------------------------------------------------------
    // Market data
    // ---------------------------------------------------------------------

    /// Query the venue and store the result in the cache.
    async fn update_ticker(&self, pair: &CurrencyPair, asset: AssetType) -> Result<Ticker>;

    /// Query the venue and store the result in the cache.
    async fn update_orderbook(&self, pair: &CurrencyPair, asset: AssetType) -> Result<Orderbook>;

    /// Cached ticker, or a fresh one from [`Exchange::update_ticker`].
    async fn fetch_ticker(&self, pair: &CurrencyPair, asset: AssetType) -> Result<Ticker> {
        match self.profile().cache().fetch_ticker(self.name(), pair, asset) {
            Err(err) if err.is_cache_miss() => self.update_ticker(pair, asset).await,
            other => other,
        }
    }

    /// Cached orderbook, or a fresh one from [`Exchange::update_orderbook`].
    async fn fetch_orderbook(&self, pair: &CurrencyPair, asset: AssetType) -> Result<Orderbook> {
        match self.profile().cache().fetch_orderbook(self.name(), pair, asset) {
            Err(err) if err.is_cache_miss() => self.update_orderbook(pair, asset).await,
            other => other,
        }
    }

    // ---------------------------------------------------------------------
    // Pairs
    // ---------------------------------------------------------------------

    /// Symbols the venue currently lists for `asset`.
    async fn fetch_tradable_pairs(&self, asset: AssetType) -> Result<Vec<String>>;

    /// Fetch the venue's listing and reconcile the available set.
    ///
    /// A failed fetch leaves the profile untouched.
    async fn update_tradable_pairs(&self, force: bool) -> Result<PairDiff> {
        let asset = self
            .profile()
            .asset_types()
            .iter()
            .next()
            .unwrap_or(AssetType::Spot);
        let pairs = self.fetch_tradable_pairs(asset).await?;
        self.profile().update_pairs(&pairs, false, force)
    }

    // ---------------------------------------------------------------------
    // Account and trading
    // ---------------------------------------------------------------------

    async fn account_info(&self) -> Result<AccountInfo> {
        Err(Error::not_yet_implemented(self.name(), "account_info"))
    }

    async fn exchange_history(
        &self,
        _pair: &CurrencyPair,
        _asset: AssetType,
    ) -> Result<Vec<TradeHistory>> {
        Err(Error::not_yet_implemented(self.name(), "exchange_history"))
    }

    async fn funding_history(&self) -> Result<Vec<FundHistory>> {
        Err(Error::not_yet_implemented(self.name(), "funding_history"))
    }

    async fn submit_order(&self, _order: &SubmitOrder) -> Result<SubmitOrderResponse> {
        Err(Error::not_yet_implemented(self.name(), "submit_order"))
    }

    /// Returns the id of the modified order.
    async fn modify_order(&self, _order: &ModifyOrder) -> Result<String> {
        Err(Error::not_yet_implemented(self.name(), "modify_order"))
    }

    async fn cancel_order(&self, _order: &OrderCancellation) -> Result<()> {
        Err(Error::not_yet_implemented(self.name(), "cancel_order"))
    }

    async fn cancel_all_orders(
        &self,
        _order: &OrderCancellation,
    ) -> Result<CancelAllOrdersResponse> {
        Err(Error::not_yet_implemented(self.name(), "cancel_all_orders"))
    }

    async fn order_info(&self, _order_id: &str) -> Result<OrderDetail> {
        Err(Error::not_yet_implemented(self.name(), "order_info"))
    }

    async fn deposit_address(&self, _currency: &str) -> Result<String> {
        Err(Error::not_yet_implemented(self.name(), "deposit_address"))
    }

    /// Returns the venue's withdrawal id.
    async fn withdraw_crypto_funds(&self, _request: &CryptoWithdrawRequest) -> Result<String> {
        Err(Error::not_yet_implemented(self.name(), "withdraw_crypto_funds"))
    }

    /// Returns the venue's withdrawal id.
    async fn withdraw_fiat_funds(&self, _request: &FiatWithdrawRequest) -> Result<String> {
        Err(Error::not_yet_implemented(self.name(), "withdraw_fiat_funds"))
    }

    async fn fee_by_type(&self, _fee: &FeeBuilder) -> Result<Decimal> {
        Err(Error::not_yet_implemented(self.name(), "fee_by_type"))
    }

    // ---------------------------------------------------------------------
    // Capabilities and transport
    // ---------------------------------------------------------------------

    fn withdraw_permissions(&self) -> WithdrawPermissions {
        self.profile().withdraw_permissions()
    }

    fn supports_withdraw_permissions(&self, requested: WithdrawPermissions) -> bool {
        self.profile().supports_withdraw_permissions(requested)
    }

    fn format_withdraw_permissions(&self) -> String {
        self.profile().format_withdraw_permissions()
    }

    fn websocket(&self) -> Result<Arc<Websocket>> {
        self.profile()
            .websocket()
            .ok_or_else(|| Error::not_supported(self.name(), "websocket"))
    }

    fn set_client_proxy_address(&self, address: &str) -> Result<()> {
        self.profile().set_client_proxy_address(address)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Migrates stale pair formats, reconciles tradable pairs when auto
    /// updates are on, then polls tickers for the enabled pairs. Failures
    /// are logged and never end the loop.
    async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let profile = self.profile();
        if !profile.is_enabled() {
            return Ok(());
        }
        let enabled = profile.enabled_pair_strings();
        info!(
            exchange = %self.name(),
            count = enabled.len(),
            pairs = %enabled.join(","),
            "polling enabled pairs"
        );

        let force = match self.default_pair() {
            Some(pair) => profile.migrate_pair_format(pair).unwrap_or_else(|err| {
                error!(exchange = %self.name(), error = %err, "pair format migration failed");
                false
            }),
            None => false,
        };
        let mut stopped = false;
        if force || (profile.supports_auto_pair_updates() && profile.is_auto_pair_updates_enabled())
        {
            tokio::select! {
                () = shutdown_requested(&mut shutdown) => stopped = true,
                result = self.update_tradable_pairs(force) => {
                    if let Err(err) = result {
                        error!(exchange = %self.name(), error = %err, "failed to update tradable pairs");
                    }
                }
            }
        }

        let mut ticker = tokio::time::interval(self.polling_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        while !stopped {
            tokio::select! {
                () = shutdown_requested(&mut shutdown) => stopped = true,
                _ = ticker.tick() => {
                    // An in-flight round is dropped when shutdown arrives.
                    tokio::select! {
                        () = shutdown_requested(&mut shutdown) => stopped = true,
                        () = poll_tickers(self) => {}
                    }
                }
            }
        }

        if let Some(ws) = profile.websocket() {
            ws.shutdown().await;
        }
        info!(exchange = %self.name(), "exchange stopped");
        Ok(())
    }
}

/// Resolves once `shutdown` holds `true` or its sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if *shutdown.borrow_and_update() {
        return;
    }
    while shutdown.changed().await.is_ok() {
        if *shutdown.borrow_and_update() {
            return;
        }
    }
}

/// One polling round over the enabled pairs.
///
/// With ticker batching, a single call refreshes every pair.
async fn poll_tickers<E: Exchange + ?Sized>(exchange: &E) {
    let profile = exchange.profile();
    let pairs = profile.enabled_pairs();
    let batched = profile.supports_rest_ticker_batch_updates();

    for asset in profile.asset_types().iter() {
        for pair in &pairs {
            match exchange.update_ticker(pair, asset).await {
                Ok(ticker) => debug!(
                    exchange = %exchange.name(),
                    pair = %pair,
                    asset = %asset,
                    last = %ticker.last,
                    "ticker updated"
                ),
                Err(err) => warn!(
                    exchange = %exchange.name(),
                    pair = %pair,
                    asset = %asset,
                    error = %err,
                    "ticker update failed"
                ),
            }
            if batched {
                break;
            }
        }
    }
}
