use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_PER_WINDOW: usize = 20;

/// Per-guild sliding-window admission control.
///
/// Process-local on purpose: with N instances the effective limit is
/// N x max. The backend stays the authoritative throttle; this is
/// front-line protection for the scorecard ingest path.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_per_window: usize,
    buckets: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_PER_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(window: Duration, max_per_window: usize) -> Self {
        Self {
            window,
            max_per_window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Admits or rejects one event for `guild_id` right now.
    pub fn admit(&self, guild_id: &str) -> bool {
        self.admit_at(guild_id, Instant::now())
    }

    /// Clock-injected variant of [`RateLimiter::admit`].
    pub fn admit_at(&self, guild_id: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter poisoned");
        let bucket = buckets.entry(guild_id.to_string()).or_default();
        while let Some(oldest) = bucket.front() {
            if now.duration_since(*oldest) >= self.window {
                bucket.pop_front();
            } else {
                break;
            }
        }
        if bucket.len() >= self.max_per_window {
            warn!(guild_id, count = bucket.len(), "rate limit exceeded");
            return false;
        }
        bucket.push_back(now);
        true
    }

    #[cfg(test)]
    fn bucket_len(&self, guild_id: &str) -> usize {
        self.buckets
            .lock()
            .expect("rate limiter poisoned")
            .get(guild_id)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::default();
        let now = Instant::now();
        for _ in 0..DEFAULT_MAX_PER_WINDOW {
            assert!(limiter.admit_at("G1", now));
        }
        assert!(!limiter.admit_at("G1", now));
        assert!(limiter.bucket_len("G1") <= DEFAULT_MAX_PER_WINDOW);
    }

    #[test]
    fn aged_out_timestamps_free_capacity() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();
        assert!(limiter.admit_at("G1", start));
        assert!(limiter.admit_at("G1", start + Duration::from_secs(30)));
        assert!(!limiter.admit_at("G1", start + Duration::from_secs(45)));
        // The first admission leaves the window at t+60.
        assert!(limiter.admit_at("G1", start + Duration::from_secs(61)));
        assert!(!limiter.admit_at("G1", start + Duration::from_secs(62)));
    }

    #[test]
    fn guilds_do_not_share_buckets() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert!(limiter.admit_at("G1", now));
        assert!(limiter.admit_at("G2", now));
        assert!(!limiter.admit_at("G1", now));
    }

    #[test]
    fn bucket_only_holds_in_window_timestamps() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 20);
        let start = Instant::now();
        limiter.admit_at("G1", start);
        limiter.admit_at("G1", start + Duration::from_secs(50));
        limiter.admit_at("G1", start + Duration::from_secs(70));
        // The admission at t+0 has aged out by t+70.
        assert_eq!(limiter.bucket_len("G1"), 2);
    }
}
