//! Fixed-window token bucket.
//!
//! Each window of `duration` grants `rate` tokens. A caller that finds the
//! bucket empty sleeps until the window rolls over; it never gets an error.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Request quota for one bucket (authenticated or unauthenticated).
#[derive(Debug)]
pub struct RateLimit {
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    duration: Duration,
    rate: u32,
    tokens: u32,
    window_start: Instant,
}

impl BucketState {
    /// Roll the window forward if it has expired.
    fn refill(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= self.duration {
            self.tokens = self.rate;
            self.window_start = now;
        }
    }

    /// Take a token, or report how long until the next refill.
    fn take(&mut self, now: Instant) -> Option<Duration> {
        if self.rate == 0 {
            return None;
        }
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            None
        } else {
            Some((self.window_start + self.duration).saturating_duration_since(now))
        }
    }
}

impl RateLimit {
    /// `rate` tokens per `duration`. A rate of zero means unlimited.
    pub fn new(duration: Duration, rate: u32) -> Self {
        Self {
            state: Mutex::new(BucketState {
                duration,
                rate,
                tokens: rate,
                window_start: Instant::now(),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    /// Replace the quota and start a fresh window.
    pub fn reconfigure(&self, duration: Duration, rate: u32) {
        let mut state = self.state.lock();
        state.duration = duration;
        state.rate = rate;
        state.tokens = rate;
        state.window_start = Instant::now();
    }

    pub fn apply(&self, config: &RateLimitConfig) {
        self.reconfigure(Duration::from_millis(config.duration_ms), config.rate);
    }

    pub fn duration(&self) -> Duration {
        self.state.lock().duration
    }

    pub fn rate(&self) -> u32 {
        self.state.lock().rate
    }

    pub fn is_unlimited(&self) -> bool {
        self.rate() == 0
    }

    /// Tokens left in the current window.
    pub fn remaining(&self) -> u32 {
        let mut state = self.state.lock();
        state.refill(Instant::now());
        state.tokens
    }

    /// Take a token without waiting.
    ///
    /// Returns the time until the next refill when the bucket is empty.
    pub fn try_acquire(&self) -> std::result::Result<(), Duration> {
        match self.state.lock().take(Instant::now()) {
            None => Ok(()),
            Some(wait) => Err(wait),
        }
    }

    /// Take a token, sleeping until the next refill while the bucket is empty.
    pub async fn acquire(&self) {
        while let Err(wait) = self.try_acquire() {
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn grants_rate_tokens_per_window() {
        let limit = RateLimit::new(Duration::from_secs(1), 2);
        assert!(limit.try_acquire().is_ok());
        assert!(limit.try_acquire().is_ok());

        let wait = limit.try_acquire().unwrap_err();
        assert_eq!(wait, Duration::from_secs(1));
        assert_eq!(limit.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_refill() {
        let limit = RateLimit::new(Duration::from_millis(500), 1);
        let start = Instant::now();

        limit.acquire().await;
        limit.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_is_unlimited() {
        let limit = RateLimit::unlimited();
        let start = Instant::now();
        for _ in 0..1_000 {
            limit.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(limit.is_unlimited());
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_resets_window() {
        let limit = RateLimit::new(Duration::from_secs(60), 1);
        limit.acquire().await;
        assert!(limit.try_acquire().is_err());

        limit.apply(&RateLimitConfig {
            duration_ms: 1_000,
            rate: 5,
        });
        assert_eq!(limit.remaining(), 5);
        assert_eq!(limit.duration(), Duration::from_secs(1));
    }
}
