//! Admission control for every inbound request.
//!
//! Makes an atomic, race-free admit/reject decision against a sliding
//! window shared across all server instances via Redis, falls back to an
//! in-process counter when Redis is unreachable, and keeps authentication
//! traffic fail-closed during an outage.

pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod fallback;
pub mod ip;
pub mod middleware;
pub mod path;
pub mod store;
pub mod types;

pub use classify::classify;
pub use config::*;
pub use constants::*;
pub use error::*;
pub use fallback::FallbackLimiter;
pub use ip::*;
pub use middleware::{admission_control, AdmissionControl};
pub use path::{is_exempt, normalize_path};
pub use store::{CounterStore, RedisWindowStore};
pub use types::*;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
