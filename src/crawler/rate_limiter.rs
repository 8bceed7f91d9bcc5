//! Process-wide request spacing
//!
//! A leaky bucket of one: no burst capacity, request starts are spaced at
//! least `min_delay` apart no matter how many tasks share the limiter.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-spacing rate limiter shared by every listing-page fetch
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_grant: Mutex::new(None),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Waits for a slot and stamps the grant in one step
    ///
    /// The lock is held across the sleep, so concurrent callers queue up
    /// behind each other and are granted strictly `min_delay` apart.
    pub async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;
        if let Some(at) = *last {
            tokio::time::sleep_until(at + self.min_delay).await;
        }
        *last = Some(Instant::now());
    }
}
