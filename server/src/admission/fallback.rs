//! In-process fallback counter.
//!
//! Used only while the distributed store is unreachable. State is local to
//! this process, so under horizontal scale-out it only approximates the
//! true global rate; that is the accepted trade-off of failing open.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::admission::WindowSnapshot;

/// Mutex-protected sliding-window-log counter keyed like the store.
pub struct FallbackLimiter {
    /// Admitted-request timestamps per key, oldest first
    windows: Mutex<HashMap<String, Vec<u64>>>,
    /// Keys idle longer than twice this are discarded by the sweeper
    longest_window_ms: u64,
    /// Sweep task shutdown sender (Some while the task is running)
    sweep_shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl FallbackLimiter {
    pub fn new(longest_window_ms: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            longest_window_ms,
            sweep_shutdown: Mutex::new(None),
        }
    }

    /// A poisoned lock still holds structurally valid data (timestamps),
    /// so recover the guard instead of propagating the panic.
    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Same check-and-admit semantics as the distributed store, serialized
    /// by the map mutex: expire entries older than the window, count the
    /// survivors, and record the request only if it is admitted (so a
    /// rejection never counts against the window).
    pub fn check(&self, key: &str, limit: u32, window_ms: u64, now_ms: u64) -> WindowSnapshot {
        let mut windows = Self::lock(&self.windows);
        let entries = windows.entry(key.to_string()).or_default();

        // An entry exactly one window old is expired, matching the store's
        // inclusive ZREMRANGEBYSCORE removal.
        let floor = now_ms.saturating_sub(window_ms);
        entries.retain(|ts| *ts > floor);

        let count = entries.len() as u32;
        let allowed = count < limit;
        if allowed {
            entries.push(now_ms);
        }
        let oldest_ms = entries.first().copied().unwrap_or(now_ms);

        WindowSnapshot {
            count,
            allowed,
            oldest_ms,
        }
    }

    /// Discards keys whose newest entry is older than twice the longest
    /// configured window, bounding memory growth.
    pub fn sweep(&self, now_ms: u64) {
        let horizon = now_ms.saturating_sub(self.longest_window_ms * 2);
        let mut windows = Self::lock(&self.windows);
        let before = windows.len();
        windows.retain(|_, entries| entries.last().is_some_and(|ts| *ts >= horizon));
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "Swept idle fallback keys");
        }
    }

    /// Number of tracked keys, for tests and diagnostics.
    pub fn tracked_keys(&self) -> usize {
        Self::lock(&self.windows).len()
    }

    /// Starts the periodic sweep task.
    ///
    /// The task runs until `stop_sweeper` is called or the process exits.
    /// Starting again replaces a previously running task.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        let (tx, mut rx) = oneshot::channel();
        if let Some(old) = Self::lock(&self.sweep_shutdown).replace(tx) {
            let _ = old.send(());
        }

        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut rx => {
                        info!("Fallback sweep task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        limiter.sweep(crate::admission::now_ms());
                    }
                }
            }
        });
    }

    /// Signals the sweep task to stop. Idempotent.
    pub fn stop_sweeper(&self) {
        if let Some(tx) = Self::lock(&self.sweep_shutdown).take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for FallbackLimiter {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}
