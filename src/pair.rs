//! Currency pair spelling and pair-set reconciliation.
//!
//! Exchanges spell the same market differently (`BTC-USD`, `btc_usd`,
//! `XBTUSD`). A [`PairFormat`] captures one spelling convention; every
//! exchange carries two of them, one for outbound request symbols and one
//! for the user-facing config strings.
//!
//! [`diff_pairs`] computes the additions and removals between a previously
//! stored pair list and a freshly fetched one. The profile uses it to decide
//! whether a persistence write is needed at all.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Spelling rules for a currency pair symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairFormat {
    #[serde(default)]
    pub uppercase: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub delimiter: String,
    /// Joins several pairs in one request parameter (e.g. `,` or `-`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub separator: String,
    /// Currency code used to split undelimited symbols (e.g. `BTC` in `XRPBTC`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub index: String,
}

impl PairFormat {
    pub fn new(delimiter: impl Into<String>, uppercase: bool) -> Self {
        Self {
            uppercase,
            delimiter: delimiter.into(),
            ..Default::default()
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    /// Render `pair` in this format.
    pub fn format(&self, pair: &CurrencyPair) -> String {
        pair.display(&self.delimiter, self.uppercase)
    }

    /// Render several pairs joined by this format's separator.
    pub fn format_many(&self, pairs: &[CurrencyPair]) -> String {
        pairs
            .iter()
            .map(|p| self.format(p))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// Parse stored pair strings written in this format.
    ///
    /// Entries that cannot be split are skipped.
    pub fn parse_pairs<S: AsRef<str>>(&self, pairs: &[S]) -> Vec<CurrencyPair> {
        pairs
            .iter()
            .map(AsRef::as_ref)
            .filter(|s| !s.is_empty())
            .filter_map(|s| {
                if !self.delimiter.is_empty() {
                    CurrencyPair::from_delimited(s, &self.delimiter)
                } else if !self.index.is_empty() {
                    CurrencyPair::from_index(s, &self.index)
                } else {
                    CurrencyPair::from_fixed_split(s, 3)
                }
            })
            .collect()
    }
}

/// A base/quote currency pair.
///
/// Equality ignores case and delimiter: `btc-usd` and `BTC_USD` are the
/// same market.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct CurrencyPair {
    base: String,
    quote: String,
    #[serde(default)]
    delimiter: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
            delimiter: String::new(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Split `symbol` at the first occurrence of `delimiter`.
    pub fn from_delimited(symbol: &str, delimiter: &str) -> Option<Self> {
        if delimiter.is_empty() {
            return None;
        }
        let (base, quote) = symbol.split_once(delimiter)?;
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some(Self::new(base, quote).with_delimiter(delimiter))
    }

    /// Split an undelimited symbol around a known currency code.
    ///
    /// `from_index("XRPBTC", "BTC")` yields `XRP/BTC`, and
    /// `from_index("BTCUSD", "BTC")` yields `BTC/USD`.
    pub fn from_index(symbol: &str, index: &str) -> Option<Self> {
        if index.is_empty() {
            return None;
        }
        // ASCII folding keeps byte offsets valid for `symbol`.
        let upper = symbol.to_ascii_uppercase();
        let index = index.to_ascii_uppercase();
        let pos = upper.find(&index)?;
        let at = if pos == 0 { index.len() } else { pos };
        if !symbol.is_char_boundary(at) {
            return None;
        }
        let (base, quote) = symbol.split_at(at);
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some(Self::new(base, quote))
    }

    /// Split an undelimited symbol after `at` characters.
    pub fn from_fixed_split(symbol: &str, at: usize) -> Option<Self> {
        if symbol.len() <= at || !symbol.is_char_boundary(at) {
            return None;
        }
        let (base, quote) = symbol.split_at(at);
        Some(Self::new(base, quote))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Render with an explicit delimiter and case.
    pub fn display(&self, delimiter: &str, uppercase: bool) -> String {
        let raw = format!("{}{}{}", self.base, delimiter, self.quote);
        if uppercase {
            raw.to_uppercase()
        } else {
            raw.to_lowercase()
        }
    }

    /// Case-folded (base, quote) key used for comparisons.
    pub(crate) fn key(&self) -> (String, String) {
        (self.base.to_uppercase(), self.quote.to_uppercase())
    }
}

impl PartialEq for CurrencyPair {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl std::hash::Hash for CurrencyPair {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.base, self.delimiter, self.quote)
    }
}

/// Outcome of comparing a stored pair list to a freshly fetched one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairDiff {
    /// Present in the fetch, absent from the stored list.
    pub new_pairs: Vec<String>,
    /// Present in the stored list, absent from the fetch.
    pub removed_pairs: Vec<String>,
}

impl PairDiff {
    pub fn is_empty(&self) -> bool {
        self.new_pairs.is_empty() && self.removed_pairs.is_empty()
    }
}

/// Set difference in both directions, on exact symbol strings.
///
/// Output order follows the input order of each side.
pub fn diff_pairs<K: AsRef<str>, F: AsRef<str>>(known: &[K], fetched: &[F]) -> PairDiff {
    let known_set: HashSet<&str> = known.iter().map(AsRef::as_ref).collect();
    let fetched_set: HashSet<&str> = fetched.iter().map(AsRef::as_ref).collect();

    let new_pairs = fetched
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !known_set.contains(p))
        .map(str::to_owned)
        .collect();
    let removed_pairs = known
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !fetched_set.contains(p))
        .map(str::to_owned)
        .collect();

    PairDiff {
        new_pairs,
        removed_pairs,
    }
}

/// Uppercase every entry and drop empty ones.
///
/// Entries holding comma-joined lists are split, and duplicates are removed
/// keeping the first occurrence.
pub fn normalize_pairs<S: AsRef<str>>(products: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    products
        .iter()
        .flat_map(|p| p.as_ref().split(','))
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Split a comma-joined config string into its entries.
pub fn split_pair_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Whether any stored pair contains `delimiter`.
pub fn any_contains_delimiter<S: AsRef<str>>(pairs: &[S], delimiter: &str) -> bool {
    pairs.iter().any(|p| p.as_ref().contains(delimiter))
}
