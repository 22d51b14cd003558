//! Per-source request pacing.

use std::time::{Duration, Instant};

/// Default minimum interval between requests to one cinema site.
pub(crate) const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);

/// Minimum-interval limiter; one per source client.
///
/// Cinema sites are scraped politely: consecutive requests to the same
/// host (Odeon day pages, retries) are spaced by at least `min_interval`.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum interval between requests.
    min_interval: Duration,
    /// Last request timestamp.
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// Creates a limiter with the given minimum interval.
    pub(crate) const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Waits until the next request is allowed.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval.saturating_sub(elapsed)).await;
            }
        }

        self.last_request = Some(Instant::now());
    }
}
