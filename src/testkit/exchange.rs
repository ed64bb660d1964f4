//! Scripted [`Exchange`] implementation for testing.
//!
//! [`MockExchange`] answers venue calls from in-memory state instead of the
//! network and counts every call, so tests can assert on cache hits,
//! reconciliation and the polling loop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::asset::AssetType;
use crate::config::{ConfigStore, FeaturesSupportedConfig};
use crate::error::{Error, Result};
use crate::exchange::{Exchange, ExchangeProfile, ProfileDefaults, DEFAULT_POLLING_INTERVAL};
use crate::market::{MarketDataCache, Orderbook, OrderbookItem, Ticker};
use crate::pair::{CurrencyPair, PairFormat};

/// Name the mock registers under.
pub const MOCK_EXCHANGE: &str = "Mock";

/// Built-in settings of the mock: `_` delimited pairs, REST and automatic
/// pair updates supported, no rate limits.
pub fn defaults() -> ProfileDefaults {
    ProfileDefaults::new(MOCK_EXCHANGE)
        .api_urls("https://api.mock.test", "https://trade.mock.test")
        .websocket_url("wss://ws.mock.test")
        .pair_formats(PairFormat::new("_", false), PairFormat::new("_", true))
        .supports(FeaturesSupportedConfig {
            rest: true,
            auto_pair_updates: true,
            ..Default::default()
        })
}

/// A connector backed by scripted state.
pub struct MockExchange {
    profile: ExchangeProfile,
    tradable: Mutex<Vec<String>>,
    fail_fetch: AtomicBool,
    last_price: Mutex<Decimal>,
    default_pair: Option<String>,
    polling_interval: Duration,
    venue_delay: Duration,
    ticker_calls: AtomicUsize,
    orderbook_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockExchange {
    pub fn new(cache: Arc<MarketDataCache>, store: Arc<dyn ConfigStore>) -> Self {
        Self::with_defaults(defaults(), cache, store)
    }

    pub fn with_defaults(
        defaults: ProfileDefaults,
        cache: Arc<MarketDataCache>,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            profile: ExchangeProfile::new(defaults, store, cache),
            tradable: Mutex::new(Vec::new()),
            fail_fetch: AtomicBool::new(false),
            last_price: Mutex::new(Decimal::ONE),
            default_pair: None,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            venue_delay: Duration::ZERO,
            ticker_calls: AtomicUsize::new(0),
            orderbook_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Matches [`ExchangeConstructor`](crate::exchange::ExchangeConstructor).
    pub fn construct(cache: Arc<MarketDataCache>, store: Arc<dyn ConfigStore>) -> Arc<dyn Exchange> {
        Arc::new(Self::new(cache, store))
    }

    pub fn with_tradable_pairs(self, pairs: &[&str]) -> Self {
        self.set_tradable_pairs(pairs);
        self
    }

    pub fn with_default_pair(mut self, pair: &str) -> Self {
        self.default_pair = Some(pair.to_string());
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Delay every ticker update and listing fetch, like a stalled venue.
    pub fn with_venue_delay(mut self, delay: Duration) -> Self {
        self.venue_delay = delay;
        self
    }

    /// Replace the listing returned by `fetch_tradable_pairs`.
    pub fn set_tradable_pairs(&self, pairs: &[&str]) {
        *self.tradable.lock() = pairs.iter().map(ToString::to_string).collect();
    }

    /// Make `fetch_tradable_pairs` fail until cleared.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_last_price(&self, price: Decimal) {
        *self.last_price.lock() = price;
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    pub fn orderbook_calls(&self) -> usize {
        self.orderbook_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn stall(&self) {
        if !self.venue_delay.is_zero() {
            tokio::time::sleep(self.venue_delay).await;
        }
    }
}

#[async_trait]
impl Exchange for MockExchange {
    fn profile(&self) -> &ExchangeProfile {
        &self.profile
    }

    fn default_pair(&self) -> Option<&str> {
        self.default_pair.as_deref()
    }

    fn polling_interval(&self) -> Duration {
        self.polling_interval
    }

    async fn update_ticker(&self, pair: &CurrencyPair, asset: AssetType) -> Result<Ticker> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        let price = *self.last_price.lock();
        let mut ticker = Ticker::empty(pair.clone());
        ticker.bid = price;
        ticker.ask = price;
        ticker.last = price;
        ticker.high = price;
        ticker.low = price;
        self.profile
            .cache()
            .process_ticker(self.name(), pair, ticker.clone(), asset)?;
        Ok(ticker)
    }

    async fn update_orderbook(&self, pair: &CurrencyPair, asset: AssetType) -> Result<Orderbook> {
        self.orderbook_calls.fetch_add(1, Ordering::SeqCst);
        let price = *self.last_price.lock();
        let book = Orderbook::new(
            pair.clone(),
            vec![OrderbookItem::new(price, Decimal::ONE)],
            vec![OrderbookItem::new(price + Decimal::ONE, Decimal::ONE)],
        );
        self.profile
            .cache()
            .process_orderbook(self.name(), pair, book.clone(), asset)?;
        Ok(book)
    }

    async fn fetch_tradable_pairs(&self, _asset: AssetType) -> Result<Vec<String>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Connection(format!(
                "{MOCK_EXCHANGE}: scripted listing failure"
            )));
        }
        Ok(self.tradable.lock().clone())
    }
}
