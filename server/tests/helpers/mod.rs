//! Shared fixtures for admission-control integration tests.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};

use mazra_server::admission::{
    admission_control, AdmissionControl, CounterStore, RateLimitConfig, StoreError, WindowSnapshot,
};

/// Deterministic in-memory counter store with an availability switch.
///
/// Mirrors the Redis script semantics: expire, count, record, and compensate
/// a rejection, all under one lock.
#[derive(Default)]
pub struct FakeStore {
    windows: Mutex<HashMap<String, Vec<u64>>>,
    unavailable: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulates a store outage (or recovery).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl CounterStore for FakeStore {
    async fn check(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<WindowSnapshot, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }

        let mut windows = self.windows.lock().unwrap();
        let entries = windows.entry(key.to_string()).or_default();

        // Inclusive removal at the boundary, like ZREMRANGEBYSCORE
        let floor = now_ms.saturating_sub(window_ms);
        entries.retain(|ts| *ts > floor);

        let count = entries.len() as u32;
        let allowed = count < limit;
        entries.push(now_ms);
        if !allowed {
            // compensating remove: a rejection never counts
            entries.pop();
        }
        let oldest_ms = entries.first().copied().unwrap_or(now_ms);

        Ok(WindowSnapshot {
            count,
            allowed,
            oldest_ms,
        })
    }
}

/// Builds a router with sample routes guarded by admission control.
pub fn test_router(config: RateLimitConfig, store: Arc<FakeStore>) -> (Router, AdmissionControl) {
    let admission = AdmissionControl::new(config, store);
    let router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/api/fields",
            get(|| async { Json(serde_json::json!({ "fields": [] })) })
                .post(|| async { Json(serde_json::json!({ "created": true })) }),
        )
        .route("/api/auth/login", post(|| async { "welcome" }))
        .layer(from_fn_with_state(admission.clone(), admission_control));
    (router, admission)
}

/// Builds a request carrying a direct peer address and optional headers.
pub fn request(method: &str, uri: &str, peer: [u8; 4], headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(peer[0], peer[1], peer[2], peer[3])),
        40000,
    )));
    request
}
