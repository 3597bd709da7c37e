// src/engine/limiter.rs
// =============================================================================
// Global pacing for attempt starts.
//
// Every probe attempt, first try or retry, asks for a slot before touching
// the network. Consecutive grants are at least `base + U(0, jitter)` apart,
// with the jitter re-drawn for every grant. No matter how many workers run,
// the outbound request rate stays bounded and irregular.
//
// The state is a single timestamp behind a tokio Mutex. The waiter holding
// the lock sleeps until its slot opens, stamps the grant time and releases
// the lock; the next waiter then measures its own gap from that stamp.
// Dropping a waiting future (e.g. on cancellation) simply gives up its place.
// =============================================================================

use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Draws a uniform random duration in `[0, max]`
pub fn jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let secs = rand::rng().random_range(0.0..=max.as_secs_f64());
    Duration::from_secs_f64(secs)
}

pub struct RateLimiter {
    base: Duration,
    jitter_max: Duration,
    /// Time of the most recent grant, None before the first one
    last_release: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(base: Duration, jitter_max: Duration) -> Self {
        Self {
            base,
            jitter_max,
            last_release: Mutex::new(None),
        }
    }

    /// Waits until the caller may start its next network attempt
    ///
    /// Returns the instant the slot was granted.
    pub async fn await_slot(&self) -> Instant {
        let mut last = self.last_release.lock().await;

        if let Some(previous) = *last {
            let gap = self.base + jitter(self.jitter_max);
            sleep_until(previous + gap).await;
        }

        let granted = Instant::now();
        *last = Some(granted);
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_jitter_stays_in_bounds() {
        let max = Duration::from_millis(300);
        for _ in 0..1000 {
            assert!(jitter(max) <= max);
        }
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_first_slot_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(5), Duration::ZERO);
        let start = Instant::now();
        limiter.await_slot().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_sequential_grants_respect_base_delay() {
        let base = Duration::from_millis(25);
        let limiter = RateLimiter::new(base, Duration::from_millis(10));

        let mut grants = Vec::new();
        for _ in 0..5 {
            grants.push(limiter.await_slot().await);
        }
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= base);
        }
    }

    #[tokio::test]
    async fn test_concurrent_grants_respect_base_delay() {
        let base = Duration::from_millis(20);
        let limiter = Arc::new(RateLimiter::new(base, Duration::from_millis(5)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.await_slot().await })
            })
            .collect();

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }
        grants.sort();
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= base);
        }
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_block_others() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(50), Duration::ZERO));
        limiter.await_slot().await;

        // Give up on a slot half way through the wait
        let _ = tokio::time::timeout(Duration::from_millis(10), limiter.await_slot()).await;

        let next = tokio::time::timeout(Duration::from_secs(1), limiter.await_slot()).await;
        assert!(next.is_ok());
    }
}
