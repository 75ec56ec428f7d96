//! Mazra Server - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use mazra_server::admission::{AdmissionControl, RateLimitConfig, RedisWindowStore};
use mazra_server::{api, config, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mazra_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Mazra Server"
    );

    // Initialize Redis
    let redis = db::create_redis_client(&config.redis_url).await?;

    // Initialize admission control
    let rl_config = RateLimitConfig::from_env();
    let store = RedisWindowStore::new(redis.clone(), Duration::from_millis(rl_config.store_timeout_ms));
    if let Err(e) = store.init().await {
        // Requests fall through to the in-process counter until the script
        // loads on a later NOSCRIPT retry.
        tracing::warn!(error = %e, "Sliding-window script load failed at startup");
    }
    let admission = AdmissionControl::new(rl_config, Arc::new(store));
    admission.start_sweeper();
    info!("Admission control initialized");

    // Build application state and router
    let state = api::AppState::new(redis, config.clone(), admission.clone());
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    admission.stop_sweeper();
    info!("Server shutdown complete");
    Ok(())
}
