//! Admission-control types.

use serde::Serialize;

/// Traffic classes with different admission thresholds.
///
/// Derived per request from (method, normalized path), never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    /// Authentication traffic (login, registration, tokens, passwords)
    Auth,
    /// Non-mutating requests
    Read,
    /// Mutating requests (POST/PUT/PATCH/DELETE)
    Write,
    /// Health, readiness, and metrics probes
    Health,
}

impl EndpointClass {
    /// Returns the string identifier for this class (used in Redis keys).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Read => "read",
            Self::Write => "write",
            Self::Health => "health",
        }
    }

    /// Returns all traffic classes.
    pub const fn all() -> &'static [EndpointClass] {
        &[Self::Auth, Self::Read, Self::Write, Self::Health]
    }
}

impl Serialize for EndpointClass {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result of an admission check. Computed fresh on every request, never stored.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// The traffic class the decision was made for
    pub class: EndpointClass,
    /// Maximum requests allowed in the window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Seconds until the oldest recorded entry leaves the window
    pub reset_secs: u64,
    /// Seconds to wait before retrying (0 if allowed)
    pub retry_after: u64,
}

impl RateLimitDecision {
    /// A fail-closed rejection: denied without consulting any counter.
    pub const fn denied(class: EndpointClass, limit: u32, window_secs: u64) -> Self {
        Self {
            allowed: false,
            class,
            limit,
            remaining: 0,
            reset_secs: window_secs,
            retry_after: window_secs,
        }
    }
}

/// Raw outcome of one atomic check-and-admit against a counter.
///
/// `count` is the number of unexpired entries *before* the new one was added,
/// `oldest_ms` the timestamp of the oldest entry still in the window.
#[derive(Debug, Clone, Copy)]
pub struct WindowSnapshot {
    pub count: u32,
    pub allowed: bool,
    pub oldest_ms: u64,
}

/// Resolved client identity stored in request extensions.
///
/// IPv4 peers are kept as-is; IPv6 peers are normalized to their /64 prefix.
#[derive(Debug, Clone)]
pub struct ClientIdentity(pub String);
