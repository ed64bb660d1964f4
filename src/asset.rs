//! Market segments an exchange trades in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Asset type (spot, margin, futures by tenor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetType {
    Spot,
    Margin,
    Binary,
    Futures,
    Futures1Week,
    Futures2Weeks,
    Futures1Month,
    Futures2Months,
    Futures3Months,
    Futures6Months,
    Futures9Months,
    Futures1Year,
}

impl AssetType {
    pub const ALL: [AssetType; 12] = [
        AssetType::Spot,
        AssetType::Margin,
        AssetType::Binary,
        AssetType::Futures,
        AssetType::Futures1Week,
        AssetType::Futures2Weeks,
        AssetType::Futures1Month,
        AssetType::Futures2Months,
        AssetType::Futures3Months,
        AssetType::Futures6Months,
        AssetType::Futures9Months,
        AssetType::Futures1Year,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            AssetType::Spot => "Spot",
            AssetType::Margin => "Margin",
            AssetType::Binary => "Binary",
            AssetType::Futures => "Futures",
            AssetType::Futures1Week => "Futures1Week",
            AssetType::Futures2Weeks => "Futures2Weeks",
            AssetType::Futures1Month => "Futures1Month",
            AssetType::Futures2Months => "Futures2Months",
            AssetType::Futures3Months => "Futures3Months",
            AssetType::Futures6Months => "Futures6Months",
            AssetType::Futures9Months => "Futures9Months",
            AssetType::Futures1Year => "Futures1Year",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        AssetType::ALL
            .iter()
            .copied()
            .find(|a| a.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "asset_types",
                reason: format!("unknown asset type '{trimmed}'"),
            })
    }
}

/// Ordered, duplicate-free set of asset types offered by one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetTypes(Vec<AssetType>);

impl AssetTypes {
    pub fn new(assets: impl IntoIterator<Item = AssetType>) -> Self {
        let mut set = Self::default();
        for asset in assets {
            set.insert(asset);
        }
        set
    }

    /// Parse a comma-separated list such as `"Spot,Futures"`.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut set = Self::default();
        for item in input.split(',').filter(|s| !s.trim().is_empty()) {
            set.insert(item.parse()?);
        }
        Ok(set)
    }

    pub fn insert(&mut self, asset: AssetType) {
        if !self.0.contains(&asset) {
            self.0.push(asset);
        }
    }

    pub fn contains(&self, asset: AssetType) -> bool {
        self.0.contains(&asset)
    }

    pub fn iter(&self) -> impl Iterator<Item = AssetType> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(AssetType::as_str)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl From<Vec<AssetType>> for AssetTypes {
    fn from(assets: Vec<AssetType>) -> Self {
        Self::new(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_join_round_trip_order() {
        let assets = AssetTypes::parse("Spot, Futures3Months,Margin").unwrap();
        assert_eq!(assets.len(), 3);
        assert_eq!(assets.join(","), "Spot,Futures3Months,Margin");
    }

    #[test]
    fn parse_skips_empty_entries_and_duplicates() {
        let assets = AssetTypes::parse("spot,,SPOT,").unwrap();
        assert_eq!(assets.len(), 1);
        assert!(assets.contains(AssetType::Spot));
    }

    #[test]
    fn parse_rejects_unknown_asset() {
        let err = AssetTypes::parse("Spot,Options").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "asset_types", .. }));
    }

    #[test]
    fn empty_input_is_empty_set() {
        assert!(AssetTypes::parse("").unwrap().is_empty());
    }
}
