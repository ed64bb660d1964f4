//! Shared store of the latest ticker and orderbook per market.
//!
//! One [`MarketDataCache`] is created by the host and handed to every
//! connector as an `Arc`. Entries are keyed by exchange name, pair and
//! asset type. Exchange names match case-insensitively, and pairs match
//! regardless of case or delimiter.
//!
//! The maps are sharded, so writers on different keys never contend and
//! readers never block each other. Last write wins; entries never expire.

mod types;

pub use types::{parse_decimal_or_zero, Orderbook, OrderbookItem, Ticker};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::asset::AssetType;
use crate::error::{Error, MarketDataKind, Result};
use crate::pair::CurrencyPair;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MarketKey {
    exchange: String,
    pair: (String, String),
    asset: AssetType,
}

impl MarketKey {
    fn new(exchange: &str, pair: &CurrencyPair, asset: AssetType) -> Self {
        Self {
            exchange: exchange.to_lowercase(),
            pair: pair.key(),
            asset,
        }
    }
}

/// Notification sent after a cache write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketUpdate {
    pub kind: MarketDataKind,
    pub exchange: String,
    pub pair: CurrencyPair,
    pub asset: AssetType,
}

/// Latest ticker and orderbook per (exchange, pair, asset type).
#[derive(Debug, Default)]
pub struct MarketDataCache {
    tickers: DashMap<MarketKey, Ticker>,
    orderbooks: DashMap<MarketKey, Orderbook>,
    tx: Option<broadcast::Sender<MarketUpdate>>,
}

impl MarketDataCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that broadcasts every write.
    #[must_use]
    pub fn with_notifications(capacity: usize) -> (Self, broadcast::Receiver<MarketUpdate>) {
        let (tx, rx) = broadcast::channel(capacity);
        let cache = Self {
            tx: Some(tx),
            ..Self::default()
        };
        (cache, rx)
    }

    /// Returns `None` if the cache was created without notifications.
    #[must_use]
    pub fn subscribe(&self) -> Option<broadcast::Receiver<MarketUpdate>> {
        self.tx.as_ref().map(broadcast::Sender::subscribe)
    }

    /// Latest ticker, or [`Error::CacheMiss`].
    pub fn fetch_ticker(
        &self,
        exchange: &str,
        pair: &CurrencyPair,
        asset: AssetType,
    ) -> Result<Ticker> {
        self.tickers
            .get(&MarketKey::new(exchange, pair, asset))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| miss(MarketDataKind::Ticker, exchange, pair, asset))
    }

    /// Insert or replace the ticker for this market.
    pub fn process_ticker(
        &self,
        exchange: &str,
        pair: &CurrencyPair,
        ticker: Ticker,
        asset: AssetType,
    ) -> Result<()> {
        validate_key(exchange, pair)?;
        self.tickers.insert(MarketKey::new(exchange, pair, asset), ticker);
        trace!(exchange, pair = %pair, asset = %asset, "ticker stored");
        self.notify(MarketDataKind::Ticker, exchange, pair, asset);
        Ok(())
    }

    /// Latest orderbook, or [`Error::CacheMiss`].
    pub fn fetch_orderbook(
        &self,
        exchange: &str,
        pair: &CurrencyPair,
        asset: AssetType,
    ) -> Result<Orderbook> {
        self.orderbooks
            .get(&MarketKey::new(exchange, pair, asset))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| miss(MarketDataKind::Orderbook, exchange, pair, asset))
    }

    /// Insert or replace the orderbook for this market.
    pub fn process_orderbook(
        &self,
        exchange: &str,
        pair: &CurrencyPair,
        orderbook: Orderbook,
        asset: AssetType,
    ) -> Result<()> {
        validate_key(exchange, pair)?;
        self.orderbooks
            .insert(MarketKey::new(exchange, pair, asset), orderbook);
        trace!(exchange, pair = %pair, asset = %asset, "orderbook stored");
        self.notify(MarketDataKind::Orderbook, exchange, pair, asset);
        Ok(())
    }

    /// Every cached ticker for one exchange.
    pub fn tickers_for_exchange(&self, exchange: &str) -> Vec<(AssetType, Ticker)> {
        let exchange = exchange.to_lowercase();
        self.tickers
            .iter()
            .filter(|entry| entry.key().exchange == exchange)
            .map(|entry| (entry.key().asset, entry.value().clone()))
            .collect()
    }

    /// Number of cached entries (tickers plus orderbooks).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickers.len() + self.orderbooks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, kind: MarketDataKind, exchange: &str, pair: &CurrencyPair, asset: AssetType) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(MarketUpdate {
                kind,
                exchange: exchange.to_string(),
                pair: pair.clone(),
                asset,
            });
        }
    }
}

fn validate_key(exchange: &str, pair: &CurrencyPair) -> Result<()> {
    if exchange.trim().is_empty() {
        return Err(Error::InvalidMarketData("exchange name is empty".into()));
    }
    if pair.base().is_empty() || pair.quote().is_empty() {
        return Err(Error::InvalidMarketData(format!(
            "{exchange}: pair '{pair}' is empty"
        )));
    }
    Ok(())
}

fn miss(kind: MarketDataKind, exchange: &str, pair: &CurrencyPair, asset: AssetType) -> Error {
    Error::CacheMiss {
        kind,
        exchange: exchange.to_string(),
        pair: pair.to_string(),
        asset,
    }
}
