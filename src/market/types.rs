//! Market-data snapshots.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pair::CurrencyPair;

/// Latest price summary for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: CurrencyPair,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Ticker {
    /// A ticker with every price at zero, stamped now.
    pub fn empty(pair: CurrencyPair) -> Self {
        Self {
            pair,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            last: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            volume: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// Midpoint of bid and ask, if both are set.
    pub fn mid(&self) -> Option<Decimal> {
        if self.bid.is_zero() || self.ask.is_zero() {
            return None;
        }
        Some((self.bid + self.ask) / Decimal::TWO)
    }
}

/// One price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookItem {
    pub price: Decimal,
    pub amount: Decimal,
}

impl OrderbookItem {
    pub const fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }
}

/// Depth snapshot.
///
/// Levels are stored in the order the connector supplied (best first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orderbook {
    pub pair: CurrencyPair,
    pub bids: Vec<OrderbookItem>,
    pub asks: Vec<OrderbookItem>,
    pub updated_at: DateTime<Utc>,
}

impl Orderbook {
    pub fn new(pair: CurrencyPair, bids: Vec<OrderbookItem>, asks: Vec<OrderbookItem>) -> Self {
        Self {
            pair,
            bids,
            asks,
            updated_at: Utc::now(),
        }
    }

    pub fn best_bid(&self) -> Option<&OrderbookItem> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderbookItem> {
        self.asks.first()
    }

    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }
}

/// Parse an exchange-supplied number, falling back to zero.
///
/// Malformed fields are logged and never abort the surrounding update.
pub fn parse_decimal_or_zero(field: &str, raw: &str) -> Decimal {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .unwrap_or_else(|err| {
            warn!(field, raw, error = %err, "malformed numeric field, using zero");
            Decimal::ZERO
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_valid_and_invalid_numbers() {
        assert_eq!(parse_decimal_or_zero("last", "101.25"), dec!(101.25));
        assert_eq!(parse_decimal_or_zero("last", " 7 "), dec!(7));
        assert_eq!(parse_decimal_or_zero("vol", "1e3"), dec!(1000));
        assert_eq!(parse_decimal_or_zero("vol", "n/a"), Decimal::ZERO);
        assert_eq!(parse_decimal_or_zero("vol", ""), Decimal::ZERO);
    }

    #[test]
    fn orderbook_best_levels_follow_input_order() {
        let book = Orderbook::new(
            CurrencyPair::new("BTC", "USD"),
            vec![
                OrderbookItem::new(dec!(100), dec!(1)),
                OrderbookItem::new(dec!(99), dec!(2)),
            ],
            vec![OrderbookItem::new(dec!(101), dec!(1))],
        );
        assert_eq!(book.best_bid().unwrap().price, dec!(100));
        assert_eq!(book.spread(), Some(dec!(1)));
    }

    #[test]
    fn ticker_mid_requires_both_sides() {
        let mut ticker = Ticker::empty(CurrencyPair::new("BTC", "USD"));
        assert_eq!(ticker.mid(), None);
        ticker.bid = dec!(99);
        ticker.ask = dec!(101);
        assert_eq!(ticker.mid(), Some(dec!(100)));
    }
}
