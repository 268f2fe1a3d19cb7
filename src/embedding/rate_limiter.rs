//! Token-bucket rate limiter gating the `EmbeddingWorker`'s calls to the
//! embedding provider.
//!
//! Refill is a complete reset at the end of each interval, not a gradual
//! trickle — simpler to reason about and matches most provider-side quota
//! windows (e.g. "20 requests per minute").

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Snapshot of a [`RateLimiter`]'s current state.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterStatus {
    /// Tokens currently available.
    pub available: u32,
    /// Bucket capacity.
    pub max: u32,
    /// Milliseconds until the next full refill.
    pub reset_in_ms: u64,
}

struct State {
    available: u32,
    reset_at: Instant,
}

/// A process-local token bucket.
pub struct RateLimiter {
    max: u32,
    interval: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    /// Builds a limiter allowing `tokens_per_interval` consumptions per `interval`.
    #[must_use]
    pub fn new(tokens_per_interval: u32, interval: Duration) -> Self {
        Self {
            max: tokens_per_interval,
            interval,
            state: Mutex::new(State {
                available: tokens_per_interval,
                reset_at: Instant::now() + interval,
            }),
        }
    }

    fn refill_if_due(&self, state: &mut State) {
        let now = Instant::now();
        if now >= state.reset_at {
            state.available = self.max;
            state.reset_at = now + self.interval;
        }
    }

    /// Attempts to consume one token. Returns `false` if the bucket is empty.
    pub fn try_consume(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.refill_if_due(&mut state);
        if state.available > 0 {
            state.available -= 1;
            true
        } else {
            false
        }
    }

    /// Reports the current bucket state.
    #[must_use]
    pub fn status(&self) -> RateLimiterStatus {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.refill_if_due(&mut state);
        let reset_in_ms = state.reset_at.saturating_duration_since(Instant::now()).as_millis() as u64;
        RateLimiterStatus {
            available: state.available,
            max: self.max,
            reset_in_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_then_blocks_until_refill() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));
        assert!(limiter.try_consume());
        assert!(limiter.try_consume());
        assert!(!limiter.try_consume());

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.try_consume());
    }

    #[test]
    fn status_reports_capacity() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.try_consume();
        let status = limiter.status();
        assert_eq!(status.max, 5);
        assert_eq!(status.available, 4);
    }
}
