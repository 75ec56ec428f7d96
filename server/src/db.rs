//! Redis connection layer.

use anyhow::Result;
use fred::prelude::*;
use tracing::info;

/// Create a long-lived Redis client with capped exponential reconnect.
///
/// While disconnected the client surfaces command errors immediately, so
/// admission checks fall through to the in-process counter instead of
/// attempting per-request reconnects.
pub async fn create_redis_client(redis_url: &str) -> Result<Client> {
    let config = Config::from_url(redis_url)?;
    let policy = ReconnectPolicy::new_exponential(0, 100, 10_000, 2);
    let client = Client::new(config, None, None, Some(policy));
    client.connect();
    client.wait_for_connect().await?;

    info!("Connected to Redis");
    Ok(client)
}
