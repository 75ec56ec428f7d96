//! Admission control through a real HTTP server.
//!
//! Exercises the connect-info path: identities come from the actual TCP
//! peer address, exactly as in production.

mod helpers;

use std::net::SocketAddr;

use helpers::{test_router, FakeStore};
use mazra_server::admission::{LimitConfig, RateLimitConfig, RateLimits};

async fn spawn_server(config: RateLimitConfig) -> String {
    let store = FakeStore::new();
    let (router, _) = test_router(config, store);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_server_enforces_limit_per_peer_address() {
    let config = RateLimitConfig {
        redis_key_prefix: format!("test:rl:{}", uuid::Uuid::new_v4()),
        limits: RateLimits {
            read: LimitConfig {
                requests: 3,
                window_secs: 60,
            },
            ..RateLimits::default()
        },
        ..RateLimitConfig::default()
    };
    let url = spawn_server(config).await;
    let client = reqwest::Client::new();

    for i in 0..3 {
        let resp = client
            .get(format!("{url}/api/fields"))
            .send()
            .await
            .expect("Request failed");
        assert_eq!(resp.status(), 200, "request {} should succeed", i + 1);
        assert!(resp.headers().contains_key("X-RateLimit-Limit"));
    }

    let resp = client
        .get(format!("{url}/api/fields"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), 429, "4th request should be rejected");
    assert!(resp.headers().contains_key("Retry-After"));

    let body: serde_json::Value = resp.json().await.expect("Invalid JSON body");
    assert_eq!(body["error"], "rate_limit_exceeded");
    assert_eq!(body["endpointType"], "read");
}

#[tokio::test]
async fn test_server_health_probe_stays_exempt() {
    let config = RateLimitConfig {
        redis_key_prefix: format!("test:rl:{}", uuid::Uuid::new_v4()),
        ..RateLimitConfig::default()
    };
    let url = spawn_server(config).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{url}/healthz"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), 200);
    assert!(!resp.headers().contains_key("X-RateLimit-Limit"));
}
