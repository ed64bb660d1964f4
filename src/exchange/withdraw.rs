//! Withdrawal-permission bitmask.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Which withdrawal paths an exchange offers through its API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WithdrawPermissions(u32);

impl WithdrawPermissions {
    pub const NONE: Self = Self(0);
    pub const AUTO_WITHDRAW_CRYPTO: Self = Self(1 << 0);
    pub const AUTO_WITHDRAW_CRYPTO_WITH_API_PERMISSION: Self = Self(1 << 1);
    pub const AUTO_WITHDRAW_CRYPTO_WITH_SETUP: Self = Self(1 << 2);
    pub const WITHDRAW_CRYPTO_WITH_2FA: Self = Self(1 << 3);
    pub const WITHDRAW_CRYPTO_WITH_SMS: Self = Self(1 << 4);
    pub const WITHDRAW_CRYPTO_WITH_EMAIL: Self = Self(1 << 5);
    pub const WITHDRAW_CRYPTO_WITH_WEBSITE_APPROVAL: Self = Self(1 << 6);
    pub const WITHDRAW_CRYPTO_WITH_API_PERMISSION: Self = Self(1 << 7);
    pub const AUTO_WITHDRAW_FIAT: Self = Self(1 << 8);
    pub const AUTO_WITHDRAW_FIAT_WITH_API_PERMISSION: Self = Self(1 << 9);
    pub const AUTO_WITHDRAW_FIAT_WITH_SETUP: Self = Self(1 << 10);
    pub const WITHDRAW_FIAT_WITH_2FA: Self = Self(1 << 11);
    pub const WITHDRAW_FIAT_WITH_SMS: Self = Self(1 << 12);
    pub const WITHDRAW_FIAT_WITH_EMAIL: Self = Self(1 << 13);
    pub const WITHDRAW_FIAT_WITH_WEBSITE_APPROVAL: Self = Self(1 << 14);
    pub const WITHDRAW_FIAT_WITH_API_PERMISSION: Self = Self(1 << 15);
    pub const WITHDRAW_CRYPTO_VIA_WEBSITE_ONLY: Self = Self(1 << 16);
    pub const WITHDRAW_FIAT_VIA_WEBSITE_ONLY: Self = Self(1 << 17);

    pub const NONE_TEXT: &'static str = "NONE, WEBSITE ONLY";

    /// Label per bit, indexed by bit position.
    const LABELS: [&'static str; 18] = [
        "AUTO WITHDRAW CRYPTO",
        "AUTO WITHDRAW CRYPTO WITH API PERMISSION",
        "AUTO WITHDRAW CRYPTO WITH SETUP",
        "WITHDRAW CRYPTO WITH 2FA",
        "WITHDRAW CRYPTO WITH SMS",
        "WITHDRAW CRYPTO WITH EMAIL",
        "WITHDRAW CRYPTO WITH WEBSITE APPROVAL",
        "WITHDRAW CRYPTO WITH API PERMISSION",
        "AUTO WITHDRAW FIAT",
        "AUTO WITHDRAW FIAT WITH API PERMISSION",
        "AUTO WITHDRAW FIAT WITH SETUP",
        "WITHDRAW FIAT WITH 2FA",
        "WITHDRAW FIAT WITH SMS",
        "WITHDRAW FIAT WITH EMAIL",
        "WITHDRAW FIAT WITH WEBSITE APPROVAL",
        "WITHDRAW FIAT WITH API PERMISSION",
        "WITHDRAW CRYPTO VIA WEBSITE ONLY",
        "WITHDRAW FIAT VIA WEBSITE ONLY",
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True iff every bit of `requested` is granted.
    pub const fn supports(self, requested: Self) -> bool {
        self.0 & requested.0 == requested.0
    }

    /// Label for bit `i`, or `UNKNOWN[1<<i]` past the table.
    fn label(i: u32) -> String {
        match Self::LABELS.get(i as usize) {
            Some(label) => (*label).to_string(),
            None => format!("UNKNOWN[1<<{i}]"),
        }
    }
}

impl BitOr for WithdrawPermissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<u32> for WithdrawPermissions {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Labels of every set bit, lowest first, joined with ` & `.
impl fmt::Display for WithdrawPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str(Self::NONE_TEXT);
        }
        let labels: Vec<String> = (0..u32::BITS)
            .filter(|i| self.0 & (1 << i) != 0)
            .map(Self::label)
            .collect();
        f.write_str(&labels.join(" & "))
    }
}
