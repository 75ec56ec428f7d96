//! API Router and Application State
//!
//! Central routing configuration and shared state. Business routes for
//! fields, sensors, and tenants are mounted by their own services; this
//! gateway owns the health probes and the admission-control layer applied
//! to everything else.

use std::sync::Arc;

use axum::{
    extract::State, middleware::from_fn_with_state, response::IntoResponse, routing::get, Json,
    Router,
};
use fred::prelude::*;
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::admission::{admission_control, AdmissionControl};
use crate::config::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Redis client
    pub redis: Client,
    /// Server configuration
    pub config: Arc<Config>,
    /// Admission-control coordinator
    pub admission: AdmissionControl,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(redis: Client, config: Config, admission: AdmissionControl) -> Self {
        Self {
            redis,
            config: Arc::new(config),
            admission,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Liveness probe. Exempt from admission control via the default skip list.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe: verifies the Redis connection.
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let status = match state.redis.ping::<String>(None).await {
        Ok(_) => "ok",
        Err(_) => "degraded",
    };
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(health))
        .route("/readyz", get(ready))
        .layer(from_fn_with_state(
            state.admission.clone(),
            admission_control,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
