//! Account, order and funding types exchanged with the engine.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pair::CurrencyPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => write!(f, "Limit"),
            Self::Market => write!(f, "Market"),
        }
    }
}

/// Balances held on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub exchange: String,
    pub currencies: Vec<AccountCurrencyInfo>,
}

impl AccountInfo {
    pub fn balance(&self, currency: &str) -> Option<&AccountCurrencyInfo> {
        self.currencies
            .iter()
            .find(|c| c.currency.eq_ignore_ascii_case(currency))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCurrencyInfo {
    pub currency: String,
    pub total_value: Decimal,
    pub hold: Decimal,
}

impl AccountCurrencyInfo {
    pub fn available(&self) -> Decimal {
        self.total_value - self.hold
    }
}

/// A public trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    pub timestamp: DateTime<Utc>,
    pub trade_id: i64,
    pub price: Decimal,
    pub amount: Decimal,
    pub exchange: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub exchange: String,
    pub id: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub price: Decimal,
    pub amount: Decimal,
    pub open_volume: Decimal,
}

/// Deposit or withdrawal record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundHistory {
    pub exchange: String,
    pub status: String,
    pub transfer_id: i64,
    pub description: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub currency: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub transfer_type: String,
    pub crypto_to_address: String,
    pub crypto_from_address: String,
    pub crypto_tx_id: String,
    pub bank_to: String,
    pub bank_from: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderResponse {
    pub order_id: String,
    pub is_order_placed: bool,
}

/// Parameters for a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOrder {
    pub pair: CurrencyPair,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: Decimal,
    /// Ignored for market orders.
    pub price: Decimal,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyOrder {
    pub order_id: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancellation {
    pub account_id: String,
    pub order_id: String,
    pub pair: CurrencyPair,
    pub wallet_address: String,
    pub side: OrderSide,
}

/// Outcome of a bulk cancel, keyed by order id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAllOrdersResponse {
    /// Order id to failure reason for orders that could not be cancelled.
    pub failures: std::collections::BTreeMap<String, String>,
}

/// A crypto withdrawal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoWithdrawRequest {
    pub currency: String,
    pub address: String,
    pub address_tag: String,
    pub amount: Decimal,
    pub description: String,
}

/// A fiat withdrawal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiatWithdrawRequest {
    pub currency: String,
    pub amount: Decimal,
    pub bank_account_name: String,
    pub bank_account_number: String,
    pub swift_code: String,
    pub iban: String,
    pub description: String,
}
