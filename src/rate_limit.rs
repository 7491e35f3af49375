use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::Config;
use crate::models::Platform;

/// Per-platform token budget. ATS portals throttle by source pattern, not by
/// which end user is applying, so buckets are keyed by platform only.
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_minute: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_per_minute: f64, now: Instant) -> Self {
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_per_minute,
            last_refill: now,
        }
    }

    /// Refill is computed lazily from elapsed time; no background timer.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed > Duration::ZERO {
            let earned = elapsed.as_secs_f64() / 60.0 * self.refill_per_minute;
            self.tokens = (self.tokens + earned).min(self.capacity);
            self.last_refill = now;
        }
    }

    fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct PlatformRateLimiter {
    buckets: DashMap<Platform, TokenBucket>,
}

impl PlatformRateLimiter {
    pub fn from_config(config: &Config) -> Self {
        let now = Instant::now();
        let buckets = DashMap::new();
        for platform in Platform::ALL {
            buckets.insert(
                platform,
                TokenBucket::new(
                    config.capacity_for(platform),
                    config.rate_refill_per_minute,
                    now,
                ),
            );
        }
        Self { buckets }
    }

    /// Non-blocking: returns false immediately when the bucket is empty.
    /// The caller requeues with a delay rather than spin-waiting.
    pub fn try_acquire(&self, platform: Platform) -> bool {
        self.try_acquire_at(platform, Instant::now())
    }

    pub fn try_acquire_at(&self, platform: Platform, now: Instant) -> bool {
        match self.buckets.get_mut(&platform) {
            Some(mut bucket) => bucket.try_take(now),
            // Unknown platform: no configured budget, refuse.
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(capacity: u32, refill_per_minute: f64) -> Config {
        Config {
            database_url: String::new(),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            log_level: "warn".to_string(),
            session_base_url: None,
            notify_url: None,
            worker_count: 1,
            poll_interval: Duration::from_secs(1),
            session_timeout: Duration::from_secs(120),
            lease_duration: Duration::from_secs(300),
            max_attempts: 5,
            backoff_base: Duration::from_secs(30),
            backoff_cap: Duration::from_secs(3600),
            captcha_retry_delay: Duration::from_secs(900),
            rate_denied_delay: Duration::from_secs(15),
            rate_capacity: capacity,
            rate_refill_per_minute: refill_per_minute,
            rate_overrides: HashMap::new(),
        }
    }

    #[test]
    fn never_oversells_capacity() {
        let limiter = PlatformRateLimiter::from_config(&config(3, 0.0));
        let now = Instant::now();
        let granted = (0..10)
            .filter(|_| limiter.try_acquire_at(Platform::Workday, now))
            .count();
        assert_eq!(granted, 3);
    }

    #[test]
    fn buckets_are_independent_per_platform() {
        let limiter = PlatformRateLimiter::from_config(&config(1, 0.0));
        let now = Instant::now();
        assert!(limiter.try_acquire_at(Platform::Workday, now));
        assert!(!limiter.try_acquire_at(Platform::Workday, now));
        assert!(limiter.try_acquire_at(Platform::Greenhouse, now));
    }

    #[test]
    fn lazy_refill_restores_tokens() {
        let limiter = PlatformRateLimiter::from_config(&config(1, 60.0));
        let start = Instant::now();
        assert!(limiter.try_acquire_at(Platform::Lever, start));
        assert!(!limiter.try_acquire_at(Platform::Lever, start));
        // 60 tokens/minute = one per second.
        assert!(limiter.try_acquire_at(Platform::Lever, start + Duration::from_secs(1)));
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let limiter = PlatformRateLimiter::from_config(&config(2, 60.0));
        let start = Instant::now();
        let later = start + Duration::from_secs(600);
        assert!(limiter.try_acquire_at(Platform::Taleo, later));
        assert!(limiter.try_acquire_at(Platform::Taleo, later));
        assert!(!limiter.try_acquire_at(Platform::Taleo, later));
    }

    #[test]
    fn per_platform_override_applies() {
        let mut cfg = config(5, 0.0);
        cfg.rate_overrides.insert(Platform::Workday, 1);
        let limiter = PlatformRateLimiter::from_config(&cfg);
        let now = Instant::now();
        assert!(limiter.try_acquire_at(Platform::Workday, now));
        assert!(!limiter.try_acquire_at(Platform::Workday, now));
    }
}
