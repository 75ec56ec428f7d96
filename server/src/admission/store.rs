//! Distributed counter store backed by Redis.
//!
//! The sliding-window-log check runs as a single Lua script so concurrent
//! callers against the same key can never both observe the pre-insert count
//! and over-admit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::admission::constants::SCRIPT_ALLOWED;
use crate::admission::{StoreError, WindowSnapshot};

/// Embedded Lua script for the atomic sliding-window check.
const SLIDING_WINDOW_SCRIPT: &str = include_str!("sliding_window.lua");

/// One atomic check-and-admit against a shared counter.
///
/// Implementations must remove expired entries, count the survivors, record
/// the new request, and refresh the key TTL as one atomic unit. Any
/// transport or command failure is reported as `StoreError::Unavailable`;
/// callers never retry inline.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn check(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<WindowSnapshot, StoreError>;
}

/// Redis-backed counter store shared across all server instances.
#[derive(Clone)]
pub struct RedisWindowStore {
    redis: Client,
    script_sha: Arc<RwLock<String>>,
    timeout: Duration,
}

impl RedisWindowStore {
    /// Creates a new store around a connected client.
    ///
    /// Call `init()` after creation to load the Lua script into Redis.
    pub fn new(redis: Client, timeout: Duration) -> Self {
        Self {
            redis,
            script_sha: Arc::new(RwLock::new(String::new())),
            timeout,
        }
    }

    /// Loads or reloads the Lua script into Redis.
    pub async fn init(&self) -> Result<(), Error> {
        let sha: String = self.redis.script_load(SLIDING_WINDOW_SCRIPT).await?;
        info!(sha = %sha, "Sliding-window Lua script loaded into Redis");
        *self.script_sha.write().await = sha;
        Ok(())
    }

    /// Checks if an error is a NOSCRIPT error (script not found in Redis).
    fn is_noscript_error(error: &Error) -> bool {
        error.to_string().contains("NOSCRIPT")
    }

    async fn evalsha(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
        member: &str,
    ) -> Result<Vec<i64>, Error> {
        let sha = self.script_sha.read().await.clone();
        self.redis
            .evalsha(
                &sha,
                vec![key],
                vec![
                    now_ms.to_string(),
                    window_ms.to_string(),
                    limit.to_string(),
                    member.to_string(),
                ],
            )
            .await
    }
}

#[async_trait]
impl CounterStore for RedisWindowStore {
    /// Executes the atomic sliding-window check with a bounded timeout.
    ///
    /// A `NOSCRIPT` error triggers one script reload and retry; every other
    /// failure, including exceeding the timeout, resolves to
    /// `StoreError::Unavailable` so the coordinator falls through to its
    /// failure policy for this single request.
    #[tracing::instrument(skip(self, limit, window_ms, now_ms))]
    async fn check(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<WindowSnapshot, StoreError> {
        // Unique member so concurrent admissions in the same millisecond
        // never collide in the sorted set.
        let member = format!("{}-{}", now_ms, uuid::Uuid::new_v4());

        let attempt = async {
            match self.evalsha(key, limit, window_ms, now_ms, &member).await {
                Ok(r) => Ok(r),
                Err(e) if Self::is_noscript_error(&e) => {
                    warn!("NOSCRIPT error, reloading sliding-window script");
                    self.init().await.map_err(|e| {
                        warn!(error = %e, "Failed to reload sliding-window script");
                        StoreError::Unavailable(e.to_string())
                    })?;
                    self.evalsha(key, limit, window_ms, now_ms, &member)
                        .await
                        .map_err(|e| {
                            warn!(error = %e, "Sliding-window check failed after reload");
                            StoreError::Unavailable(e.to_string())
                        })
                }
                Err(e) => {
                    warn!(error = %e, "Sliding-window check failed");
                    Err(StoreError::Unavailable(e.to_string()))
                }
            }
        };

        let result = tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Counter store round trip timed out");
                StoreError::Unavailable("timeout".to_string())
            })??;

        if result.len() < 3 {
            return Err(StoreError::Unavailable(format!(
                "malformed script reply of {} values",
                result.len()
            )));
        }

        Ok(WindowSnapshot {
            count: result[0].max(0) as u32,
            allowed: result[1] == SCRIPT_ALLOWED,
            oldest_ms: result[2].max(0) as u64,
        })
    }
}
