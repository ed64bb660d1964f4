//! Venuekit - shared core for cryptocurrency exchange connectors.
//!
//! Every connector built on this crate speaks to one trading venue and
//! exposes it through the same contract, so a host can load, configure
//! and poll many venues uniformly.
//!
//! # Architecture
//!
//! - **`exchange`** - The [`Exchange`](exchange::Exchange) contract and the
//!   [`ExchangeProfile`](exchange::ExchangeProfile) every connector embeds
//!   - Setup from config with write-back of corrected defaults
//!   - Tradable-pair reconciliation and pair-format migration
//!   - Withdrawal-permission bit set
//!
//! - **`request`** - Rate-limited HTTP requester with separate
//!   authenticated and unauthenticated quotas
//!
//! - **`market`** - Process-wide ticker and orderbook cache
//!
//! - **`supervisor`** - One polling task per enabled exchange
//!
//! # Modules
//!
//! - [`asset`] - Asset types (spot, margin, futures, ...)
//! - [`config`] - Exchange configuration, config stores and logging setup
//! - [`error`] - Error types for the crate
//! - [`exchange`] - Exchange contract, profile, registry and trading types
//! - [`market`] - Market-data snapshots and the shared cache
//! - [`pair`] - Currency pairs, pair formats and pair-list diffs
//! - [`request`] - HTTP requester, rate limits and nonces
//! - [`supervisor`] - Task supervision with graceful shutdown
//! - [`websocket`] - Per-exchange websocket connection handle
//!
//! # Features
//!
//! - `testkit` - Mock exchange and config fixtures for integration tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use venuekit::config::{ConfigStore, TomlConfigStore};
//! use venuekit::exchange::ExchangeRegistry;
//! use venuekit::market::MarketDataCache;
//! use venuekit::supervisor::Supervisor;
//!
//! # async fn run(registry: ExchangeRegistry) -> venuekit::Result<()> {
//! let store = TomlConfigStore::load("config.toml")?;
//! store.logging().init();
//! let names = store.exchange_names();
//! let store: Arc<dyn ConfigStore> = Arc::new(store);
//! let cache = Arc::new(MarketDataCache::new());
//!
//! let exchanges = registry.load(&names, &cache, &store).await;
//! let handle = Supervisor::new(exchanges).spawn();
//! tokio::signal::ctrl_c().await?;
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod config;
pub mod error;
pub mod exchange;
pub mod market;
pub mod pair;
pub mod request;
pub mod supervisor;
pub mod websocket;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use error::{Error, Result};
