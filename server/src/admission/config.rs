//! Admission-control configuration.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::admission::EndpointClass;

/// Configuration for the admission-control system.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether admission control is enabled
    pub enabled: bool,
    /// Prefix for Redis keys (e.g., "mazra:rl")
    pub redis_key_prefix: String,
    /// Whether AUTH traffic is rejected while the store is unreachable
    pub fail_closed_auth: bool,
    /// Peers permitted to supply a forwarded-client-address header
    pub trusted_proxies: HashSet<IpAddr>,
    /// Client identities that bypass admission control entirely
    pub allowlist: HashSet<String>,
    /// Paths exempt from admission control (exact, or `prefix/*` wildcard)
    pub skip_paths: Vec<String>,
    /// Upper bound on one store round trip in milliseconds
    pub store_timeout_ms: u64,
    /// Interval between fallback-counter sweeps in seconds
    pub sweep_interval_secs: u64,
    /// Per-class rate limits
    pub limits: RateLimits,
}

/// Rate limits for each traffic class.
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// Authentication traffic (login, registration, tokens, passwords)
    pub auth: LimitConfig,
    /// Non-mutating requests
    pub read: LimitConfig,
    /// Mutating requests
    pub write: LimitConfig,
    /// Health and metrics probes that are not on the skip list
    pub health: LimitConfig,
}

/// Configuration for a single sliding window.
#[derive(Debug, Clone, Copy)]
pub struct LimitConfig {
    /// Maximum requests allowed in the window
    pub requests: u32,
    /// Window duration in seconds
    pub window_secs: u64,
}

impl LimitConfig {
    /// Window duration in milliseconds.
    pub const fn window_ms(self) -> u64 {
        self.window_secs * 1000
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_key_prefix: "mazra:rl".to_string(),
            fail_closed_auth: true,
            trusted_proxies: HashSet::new(),
            allowlist: HashSet::new(),
            skip_paths: vec![
                "/healthz".to_string(),
                "/readyz".to_string(),
                "/livez".to_string(),
                "/metrics".to_string(),
            ],
            store_timeout_ms: 150,
            sweep_interval_secs: 60,
            limits: RateLimits::default(),
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            auth: LimitConfig { requests: 5, window_secs: 60 },
            read: LimitConfig { requests: 120, window_secs: 60 },
            write: LimitConfig { requests: 30, window_secs: 60 },
            health: LimitConfig { requests: 60, window_secs: 60 },
        }
    }
}

impl RateLimits {
    /// Returns the limit configuration for a traffic class.
    pub const fn for_class(&self, class: EndpointClass) -> LimitConfig {
        match class {
            EndpointClass::Auth => self.auth,
            EndpointClass::Read => self.read,
            EndpointClass::Write => self.write,
            EndpointClass::Health => self.health,
        }
    }

    /// The longest configured window, used to bound fallback-counter memory.
    pub fn longest_window_ms(&self) -> u64 {
        EndpointClass::all()
            .iter()
            .map(|c| self.for_class(*c).window_ms())
            .max()
            .unwrap_or(0)
    }
}

impl RateLimitConfig {
    /// Creates configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RATE_LIMIT_ENABLED`: Enable/disable admission control (default: true)
    /// - `RATE_LIMIT_PREFIX`: Redis key prefix (default: "mazra:rl")
    /// - `RATE_LIMIT_FAIL_CLOSED_AUTH`: Reject AUTH traffic when the store is down (default: true)
    /// - `RATE_LIMIT_TRUSTED_PROXIES`: Comma-separated proxy IP addresses
    /// - `RATE_LIMIT_ALLOWLIST`: Comma-separated identity allowlist
    /// - `RATE_LIMIT_SKIP_PATHS`: Comma-separated exempt paths
    /// - `RATE_LIMIT_STORE_TIMEOUT_MS`: Store round-trip bound (default: 150)
    /// - `RATE_LIMIT_SWEEP_INTERVAL_SECS`: Fallback sweep interval (default: 60)
    /// - `RATE_LIMIT_AUTH`: Auth limit as "requests,window_secs"
    /// - `RATE_LIMIT_READ`: Read limit as "requests,window_secs"
    /// - `RATE_LIMIT_WRITE`: Write limit as "requests,window_secs"
    /// - `RATE_LIMIT_HEALTH`: Health limit as "requests,window_secs"
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RATE_LIMIT_ENABLED") {
            config.enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_PREFIX") {
            config.redis_key_prefix = val;
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_FAIL_CLOSED_AUTH") {
            config.fail_closed_auth = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_TRUSTED_PROXIES") {
            config.trusted_proxies = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_ALLOWLIST") {
            config.allowlist = val.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_SKIP_PATHS") {
            config.skip_paths = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_STORE_TIMEOUT_MS") {
            if let Ok(ms) = val.trim().parse() {
                config.store_timeout_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_SWEEP_INTERVAL_SECS") {
            if let Ok(secs) = val.trim().parse() {
                config.sweep_interval_secs = secs;
            }
        }

        // Parse per-class limits (format: "requests,window_secs")
        if let Ok(val) = std::env::var("RATE_LIMIT_AUTH") {
            if let Some(limit) = parse_limit_config(&val) {
                config.limits.auth = limit;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_READ") {
            if let Some(limit) = parse_limit_config(&val) {
                config.limits.read = limit;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_WRITE") {
            if let Some(limit) = parse_limit_config(&val) {
                config.limits.write = limit;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_HEALTH") {
            if let Some(limit) = parse_limit_config(&val) {
                config.limits.health = limit;
            }
        }

        config
    }
}

/// Parses a limit config from "requests,window_secs" format.
fn parse_limit_config(val: &str) -> Option<LimitConfig> {
    let parts: Vec<&str> = val.split(',').collect();
    if parts.len() == 2 {
        let requests = parts[0].trim().parse().ok()?;
        let window_secs = parts[1].trim().parse().ok()?;
        Some(LimitConfig { requests, window_secs })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.redis_key_prefix, "mazra:rl");
        assert!(config.fail_closed_auth);
        assert!(config.trusted_proxies.is_empty());
        assert!(config.allowlist.is_empty());
        assert!(config.skip_paths.contains(&"/healthz".to_string()));
    }

    #[test]
    fn test_default_limits() {
        let limits = RateLimits::default();
        assert_eq!(limits.auth.requests, 5);
        assert_eq!(limits.auth.window_secs, 60);
        assert_eq!(limits.read.requests, 120);
        assert_eq!(limits.longest_window_ms(), 60_000);
    }

    #[test]
    fn test_for_class_covers_every_class() {
        let limits = RateLimits::default();
        for class in EndpointClass::all() {
            assert!(limits.for_class(*class).requests > 0);
        }
    }

    #[test]
    fn test_parse_limit_config() {
        let limit = parse_limit_config("10,60").unwrap();
        assert_eq!(limit.requests, 10);
        assert_eq!(limit.window_secs, 60);

        // With whitespace
        let limit = parse_limit_config(" 20 , 120 ").unwrap();
        assert_eq!(limit.requests, 20);
        assert_eq!(limit.window_secs, 120);

        // Invalid formats
        assert!(parse_limit_config("10").is_none());
        assert!(parse_limit_config("10,60,extra").is_none());
        assert!(parse_limit_config("abc,60").is_none());
    }
}
