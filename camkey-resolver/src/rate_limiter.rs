//! Minimum-spacing rate limiter
//!
//! MusicBrainz asks clients to stay at or below one request per second. The
//! limiter enforces a hard floor between consecutive requests (1100ms by
//! default); there is no burst allowance.
//!
//! One instance is created at startup and shared by every client that talks to
//! the MusicBrainz or AcousticBrainz services, so the floor applies across both.
//! The limit is per process: separate resolver instances each get their own.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Spacing required by the MusicBrainz fair-use policy, with margin
pub const MUSICBRAINZ_MIN_INTERVAL: Duration = Duration::from_millis(1100);

/// Enforces a minimum interval between requests
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may be sent, then record it as sent
    ///
    /// Called before every MusicBrainz search and every AcousticBrainz
    /// low-level fetch, so a search followed by tonal lookups for its
    /// candidates is paced as one stream against the shared floor. The lock is
    /// held across the sleep so concurrent callers queue up behind each other
    /// instead of all waking at the same instant.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!(wait_ms = wait_time.as_millis() as u64, "Rate limiting: waiting");
                sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MUSICBRAINZ_MIN_INTERVAL)
    }
}
