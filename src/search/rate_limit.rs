//! Minimum-interval rate limiter for E-utilities requests.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Spaces blocking requests at least `1 / max_per_second` apart.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter; non-positive rates disable limiting.
    pub(crate) fn new(max_per_second: f64) -> Self {
        let min_interval = if max_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / max_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub(crate) fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sleep until a request is allowed, then mark it as sent.
    pub(crate) fn acquire(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }

        *last = Some(Instant::now());
    }
}
