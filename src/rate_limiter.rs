//! Per-domain politeness delay shared by every fetch and extraction task.
//!
//! Each domain owns a "last request slot". A caller reserves the next slot
//! under the lock (previous slot plus a random gap in `[min_delay, max_delay]`)
//! and sleeps until it outside the lock, so tasks for other domains are never
//! held up and a task dropped mid-wait leaves the map consistent.

use rand::{Rng, rng};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug)]
pub struct DomainRateLimiter {
    min_delay: Duration,
    max_delay: Duration,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl DomainRateLimiter {
    /// Create a limiter. Bounds given in the wrong order are swapped.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        Self {
            min_delay,
            max_delay,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// A limiter that never waits.
    #[cfg(test)]
    pub(crate) fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    fn random_gap(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        let secs = rng().random_range(self.min_delay.as_secs_f64()..=self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Suspend until this task may hit `domain`, then return.
    ///
    /// The new slot is recorded before the wait begins.
    #[instrument(level = "debug", skip(self))]
    pub async fn throttle(&self, domain: &str) {
        let wake_at = {
            let mut slots = self.last_request.lock().await;
            let now = Instant::now();
            let slot = match slots.get(domain) {
                Some(last) => (*last + self.random_gap()).max(now),
                None => now,
            };
            slots.insert(domain.to_string(), slot);
            slot
        };

        let now = Instant::now();
        if wake_at > now {
            debug!(wait_ms = (wake_at - now).as_millis() as u64, "Throttling request");
            sleep_until(wake_at).await;
        }
    }

    /// Throttle on the host of `url`. URLs without a host pass straight through.
    pub async fn throttle_url(&self, url: &str) {
        if let Some(domain) = domain_of(url) {
            self.throttle(&domain).await;
        }
    }

    #[cfg(test)]
    async fn domains_tracked(&self) -> usize {
        self.last_request.lock().await.len()
    }
}

/// Lowercased host of `url`, if it has one.
pub fn domain_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}
