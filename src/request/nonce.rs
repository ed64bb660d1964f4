//! Strictly increasing request nonces.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Nonce source for signed requests.
///
/// Values track the wall clock in milliseconds but never repeat or go
/// backwards, even when called faster than once per millisecond.
#[derive(Debug, Default)]
pub struct Nonce(AtomicI64);

impl Nonce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.0.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .0
                .compare_exchange(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Last value handed out, zero if none.
    pub fn current(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}
