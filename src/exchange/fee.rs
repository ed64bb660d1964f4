//! Fee query input.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeeType {
    BankFee,
    InternationalBankDepositFee,
    InternationalBankWithdrawalFee,
    CryptocurrencyTradeFee,
    CryptocurrencyDepositFee,
    CryptocurrencyWithdrawalFee,
}

/// Transfer rail for bank fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BankTransactionType {
    WireTransfer,
    PerfectMoney,
    Neteller,
    AdvCash,
    Payeer,
    Skrill,
    Simplex,
    Sepa,
    Swift,
    RapidTransfer,
    MisterTangoSepa,
    Qiwi,
    VisaMastercard,
    WebMoney,
    Capitalist,
    WesternUnion,
    MoneyGram,
    Contact,
}

/// Everything a connector needs to quote a fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBuilder {
    pub fee_type: FeeType,
    pub first_currency: String,
    pub second_currency: String,
    pub delimiter: String,
    pub is_maker: bool,
    /// Fiat currency for bank fees.
    pub currency_item: String,
    pub bank_transaction_type: Option<BankTransactionType>,
    pub purchase_price: Decimal,
    pub amount: Decimal,
}

impl FeeBuilder {
    pub fn new(fee_type: FeeType) -> Self {
        Self {
            fee_type,
            first_currency: String::new(),
            second_currency: String::new(),
            delimiter: String::new(),
            is_maker: false,
            currency_item: String::new(),
            bank_transaction_type: None,
            purchase_price: Decimal::ZERO,
            amount: Decimal::ZERO,
        }
    }

    /// A trade fee quote for `amount` at `price`.
    pub fn trade(first: &str, second: &str, price: Decimal, amount: Decimal, maker: bool) -> Self {
        Self {
            first_currency: first.to_string(),
            second_currency: second.to_string(),
            purchase_price: price,
            amount,
            is_maker: maker,
            ..Self::new(FeeType::CryptocurrencyTradeFee)
        }
    }

    pub fn bank(
        fee_type: FeeType,
        currency: &str,
        rail: BankTransactionType,
        amount: Decimal,
    ) -> Self {
        Self {
            currency_item: currency.to_string(),
            bank_transaction_type: Some(rail),
            amount,
            ..Self::new(fee_type)
        }
    }

    /// Notional value of the quoted trade.
    pub fn notional(&self) -> Decimal {
        self.purchase_price * self.amount
    }
}
