use std::time::Duration;

use thiserror::Error;

use crate::asset::AssetType;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("exchange {0} not found in config")]
    ExchangeNotFound(String),

    #[error("{exchange}: {operation} called with an empty pair list")]
    EmptyPairs {
        exchange: String,
        operation: &'static str,
    },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to write config file: {0}")]
    WriteFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
}

/// Which market-data store a cache miss came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataKind {
    Ticker,
    Orderbook,
}

impl std::fmt::Display for MarketDataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ticker => write!(f, "ticker"),
            Self::Orderbook => write!(f, "orderbook"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The exchange will never offer this operation.
    #[error("{exchange}: {operation} is not supported")]
    NotSupported {
        exchange: String,
        operation: &'static str,
    },

    /// The exchange offers this operation but the connector does not yet.
    #[error("{exchange}: {operation} is not yet implemented")]
    NotYetImplemented {
        exchange: String,
        operation: &'static str,
    },

    #[error("no {kind} cached for {exchange} {pair} {asset}")]
    CacheMiss {
        kind: MarketDataKind,
        exchange: String,
        pair: String,
        asset: AssetType,
    },

    #[error("invalid market data: {0}")]
    InvalidMarketData(String),

    #[error("{exchange}: request timed out after {elapsed:?}")]
    Timeout { exchange: String, elapsed: Duration },

    #[error("{exchange}: unexpected HTTP status {status}: {body}")]
    Status {
        exchange: String,
        status: u16,
        body: String,
    },

    #[error("{exchange}: invalid credentials: {reason}")]
    Credentials { exchange: String, reason: String },

    #[error("proxy error: {0}")]
    Proxy(String),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

impl Error {
    /// Whether the engine may retry the call that produced this error.
    ///
    /// The core itself never retries.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout { .. } | Error::Connection(_) | Error::WebSocket(_) => true,
            Error::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Error::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::CacheMiss { .. })
    }

    pub fn not_supported(exchange: impl Into<String>, operation: &'static str) -> Self {
        Error::NotSupported {
            exchange: exchange.into(),
            operation,
        }
    }

    pub fn not_yet_implemented(exchange: impl Into<String>, operation: &'static str) -> Self {
        Error::NotYetImplemented {
            exchange: exchange.into(),
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_errors_are_distinguishable() {
        let never = Error::not_supported("Bitstamp", "funding_history");
        let later = Error::not_yet_implemented("Bitstamp", "funding_history");

        assert!(matches!(never, Error::NotSupported { .. }));
        assert!(matches!(later, Error::NotYetImplemented { .. }));
        assert_ne!(never.to_string(), later.to_string());
    }

    #[test]
    fn timeouts_are_transient_config_errors_are_not() {
        let timeout = Error::Timeout {
            exchange: "ZB".into(),
            elapsed: Duration::from_secs(15),
        };
        assert!(timeout.is_transient());

        let config: Error = ConfigError::MissingField { field: "url" }.into();
        assert!(!config.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Status {
            exchange: "ZB".into(),
            status: 503,
            body: String::new(),
        };
        assert!(err.is_transient());

        let err = Error::Status {
            exchange: "ZB".into(),
            status: 400,
            body: String::new(),
        };
        assert!(!err.is_transient());
    }
}
