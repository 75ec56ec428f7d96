//! Admission-control constants.

/// Redis key pre-allocation size
pub const REDIS_KEY_CAPACITY: usize = 64;

/// IPv6 prefix segments for client identity (uses /64)
pub const IPV6_PREFIX_SEGMENTS: usize = 4;

/// Lua script return code for an admitted request
pub const SCRIPT_ALLOWED: i64 = 1;

/// Response header names
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";
