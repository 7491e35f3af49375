use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use crate::models::Platform;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// Browser-automation sidecar base URL (e.g. http://localhost:4444).
    pub session_base_url: Option<String>,
    /// Terminal-state notification webhook. Events are logged locally when unset.
    pub notify_url: Option<String>,
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub session_timeout: Duration,
    pub lease_duration: Duration,
    pub max_attempts: i32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub captcha_retry_delay: Duration,
    pub rate_denied_delay: Duration,
    pub rate_capacity: u32,
    pub rate_refill_per_minute: f64,
    /// Per-platform capacity overrides, e.g. "workday=2,taleo=1".
    pub rate_overrides: HashMap<Platform, u32>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;

        let host: IpAddr = env_or("AUTOAPPLY_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid AUTOAPPLY_HOST: {e}"))?;

        let port: u16 = env_or("AUTOAPPLY_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid AUTOAPPLY_PORT: {e}"))?;

        let log_level = env_or("AUTOAPPLY_LOG_LEVEL", "info");

        let session_base_url = std::env::var("AUTOAPPLY_SESSION_URL").ok();
        let notify_url = std::env::var("AUTOAPPLY_NOTIFY_URL").ok();

        let worker_count: usize = env_or("AUTOAPPLY_WORKER_COUNT", "4")
            .parse()
            .map_err(|e| format!("Invalid AUTOAPPLY_WORKER_COUNT: {e}"))?;
        if worker_count == 0 {
            return Err("AUTOAPPLY_WORKER_COUNT must be at least 1".to_string());
        }

        let poll_interval = duration_secs("AUTOAPPLY_POLL_INTERVAL_SECS", "1")?;
        let session_timeout = duration_secs("AUTOAPPLY_SESSION_TIMEOUT_SECS", "120")?;
        let lease_duration = duration_secs("AUTOAPPLY_LEASE_SECS", "300")?;
        let backoff_base = duration_secs("AUTOAPPLY_BACKOFF_BASE_SECS", "30")?;
        let backoff_cap = duration_secs("AUTOAPPLY_BACKOFF_CAP_SECS", "3600")?;
        let captcha_retry_delay = duration_secs("AUTOAPPLY_CAPTCHA_RETRY_DELAY_SECS", "900")?;
        let rate_denied_delay = duration_secs("AUTOAPPLY_RATE_DENIED_DELAY_SECS", "15")?;

        let max_attempts: i32 = env_or("AUTOAPPLY_MAX_ATTEMPTS", "5")
            .parse()
            .map_err(|e| format!("Invalid AUTOAPPLY_MAX_ATTEMPTS: {e}"))?;

        let rate_capacity: u32 = env_or("AUTOAPPLY_RATE_CAPACITY", "5")
            .parse()
            .map_err(|e| format!("Invalid AUTOAPPLY_RATE_CAPACITY: {e}"))?;

        let rate_refill_per_minute: f64 = env_or("AUTOAPPLY_RATE_REFILL_PER_MIN", "2")
            .parse()
            .map_err(|e| format!("Invalid AUTOAPPLY_RATE_REFILL_PER_MIN: {e}"))?;

        let rate_overrides = parse_rate_overrides(&env_or("AUTOAPPLY_RATE_OVERRIDES", ""))?;

        Ok(Config {
            database_url,
            host,
            port,
            log_level,
            session_base_url,
            notify_url,
            worker_count,
            poll_interval,
            session_timeout,
            lease_duration,
            max_attempts,
            backoff_base,
            backoff_cap,
            captcha_retry_delay,
            rate_denied_delay,
            rate_capacity,
            rate_refill_per_minute,
            rate_overrides,
        })
    }

    pub fn capacity_for(&self, platform: Platform) -> u32 {
        self.rate_overrides
            .get(&platform)
            .copied()
            .unwrap_or(self.rate_capacity)
    }
}

fn parse_rate_overrides(raw: &str) -> Result<HashMap<Platform, u32>, String> {
    let mut overrides = HashMap::new();
    for part in raw.split(',').filter(|s| !s.trim().is_empty()) {
        let (name, value) = part
            .trim()
            .split_once('=')
            .ok_or_else(|| format!("Invalid AUTOAPPLY_RATE_OVERRIDES entry '{part}'"))?;
        let platform = Platform::parse(name.trim())
            .ok_or_else(|| format!("Unknown platform in AUTOAPPLY_RATE_OVERRIDES: '{name}'"))?;
        let capacity: u32 = value
            .trim()
            .parse()
            .map_err(|e| format!("Invalid capacity for '{name}': {e}"))?;
        overrides.insert(platform, capacity);
    }
    Ok(overrides)
}

fn duration_secs(key: &str, default: &str) -> Result<Duration, String> {
    let secs: u64 = env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))?;
    Ok(Duration::from_secs(secs))
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_overrides_parse() {
        let overrides = parse_rate_overrides("workday=2, taleo=1").unwrap();
        assert_eq!(overrides.get(&Platform::Workday), Some(&2));
        assert_eq!(overrides.get(&Platform::Taleo), Some(&1));
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn rate_overrides_reject_unknown_platform() {
        assert!(parse_rate_overrides("bamboohr=3").is_err());
        assert!(parse_rate_overrides("workday").is_err());
    }

    #[test]
    fn rate_overrides_empty() {
        assert!(parse_rate_overrides("").unwrap().is_empty());
    }
}
