//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`exchange`] - [`MockExchange`](exchange::MockExchange), a scripted
//!   connector with call counters.
//! - [`config`] - Canonical exchange configs and stores.

pub mod config;
pub mod exchange;
