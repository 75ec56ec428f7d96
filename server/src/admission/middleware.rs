//! Admission coordinator and axum middleware.
//!
//! Orchestrates classification, identity resolution, store selection, and
//! the fail-open/fail-closed policy, then decorates the response.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::admission::constants::REDIS_KEY_CAPACITY;
use crate::admission::{
    classify, decorate_response, extract_client_ip, is_exempt, normalize_ip, normalize_path,
    now_ms, AdmissionError, ClientIdentity, CounterStore, EndpointClass, FallbackLimiter,
    LimitConfig, RateLimitConfig, RateLimitDecision, StoreError,
};

/// Coordinator for every admission decision.
///
/// The counter store is injected so tests can substitute a deterministic
/// fake; the fallback counter is owned here and only consulted while the
/// store is unreachable.
#[derive(Clone)]
pub struct AdmissionControl {
    config: Arc<RateLimitConfig>,
    store: Arc<dyn CounterStore>,
    fallback: Arc<FallbackLimiter>,
}

impl AdmissionControl {
    pub fn new(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        let fallback = Arc::new(FallbackLimiter::new(config.limits.longest_window_ms()));
        Self {
            config: Arc::new(config),
            store,
            fallback,
        }
    }

    /// Returns the configuration for this coordinator.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Starts the fallback-counter sweep task at the configured interval.
    pub fn start_sweeper(&self) {
        self.fallback
            .start_sweeper(Duration::from_secs(self.config.sweep_interval_secs));
    }

    /// Stops the fallback-counter sweep task. Idempotent.
    pub fn stop_sweeper(&self) {
        self.fallback.stop_sweeper();
    }

    /// Builds the sliding-window key for one (class, identity) pair.
    fn build_key(&self, class: EndpointClass, identity: &str) -> String {
        let mut key = String::with_capacity(REDIS_KEY_CAPACITY);
        key.push_str(&self.config.redis_key_prefix);
        key.push(':');
        key.push_str(class.as_str());
        key.push(':');
        key.push_str(identity);
        key
    }

    /// Produces a decision for one request, store first, fallback second.
    ///
    /// Never returns an error: a store failure resolves into either a
    /// fail-closed rejection (AUTH) or a fallback-counter decision.
    async fn decide(
        &self,
        key: &str,
        class: EndpointClass,
        policy: LimitConfig,
        now: u64,
    ) -> RateLimitDecision {
        match self
            .store
            .check(key, policy.requests, policy.window_ms(), now)
            .await
        {
            Ok(snapshot) => decision_from(snapshot, class, policy, now),
            Err(StoreError::Unavailable(reason)) => {
                if class == EndpointClass::Auth && self.config.fail_closed_auth {
                    warn!(
                        key = %key,
                        reason = %reason,
                        "Counter store unavailable, rejecting auth traffic (fail-closed)"
                    );
                    RateLimitDecision::denied(class, policy.requests, policy.window_secs)
                } else {
                    warn!(
                        key = %key,
                        reason = %reason,
                        "Counter store unavailable, using in-process fallback counter"
                    );
                    let snapshot = self
                        .fallback
                        .check(key, policy.requests, policy.window_ms(), now);
                    decision_from(snapshot, class, policy, now)
                }
            }
        }
    }
}

/// Converts a raw window snapshot into a client-facing decision.
fn decision_from(
    snapshot: crate::admission::WindowSnapshot,
    class: EndpointClass,
    policy: LimitConfig,
    now: u64,
) -> RateLimitDecision {
    let reset_ms = (snapshot.oldest_ms + policy.window_ms()).saturating_sub(now);
    let reset_secs = reset_ms.div_ceil(1000);
    RateLimitDecision {
        allowed: snapshot.allowed,
        class,
        limit: policy.requests,
        remaining: if snapshot.allowed {
            policy.requests.saturating_sub(snapshot.count + 1)
        } else {
            0
        },
        reset_secs,
        retry_after: if snapshot.allowed {
            0
        } else {
            reset_secs.max(1)
        },
    }
}

/// Middleware enforcing admission control on every inbound request.
///
/// # Behavior
///
/// - Exempt paths (after normalization) pass through untouched.
/// - Every other request gets `X-RateLimit-Limit`, `X-RateLimit-Remaining`,
///   and `X-RateLimit-Reset` headers, admitted or not.
/// - A rejection returns `429 Too Many Requests` with a `Retry-After`
///   header and a bilingual JSON body.
/// - Stores the resolved `ClientIdentity` in request extensions for
///   downstream handlers.
#[tracing::instrument(skip(ctrl, request, next))]
pub async fn admission_control(
    State(ctrl): State<AdmissionControl>,
    mut request: Request,
    next: Next,
) -> Result<Response, AdmissionError> {
    let config = ctrl.config();
    if !config.enabled {
        return Ok(next.run(request).await);
    }

    let normalized = normalize_path(request.uri().path());
    if is_exempt(&normalized, &config.skip_paths) {
        return Ok(next.run(request).await);
    }

    let class = classify(request.method(), &normalized);
    // Peer address arrives through request extensions when the server is
    // driven by `into_make_service_with_connect_info`.
    let connect_info = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .cloned();
    let client_ip = extract_client_ip(
        request.headers(),
        connect_info.as_ref(),
        &config.trusted_proxies,
    );
    let identity = normalize_ip(client_ip);

    request
        .extensions_mut()
        .insert(ClientIdentity(identity.clone()));

    if config.allowlist.contains(&identity) {
        debug!(identity = %identity, "Identity in allowlist, bypassing admission control");
        return Ok(next.run(request).await);
    }

    let policy = config.limits.for_class(class);
    let key = ctrl.build_key(class, &identity);
    let now = now_ms();

    debug!(
        class = %class.as_str(),
        identity = %identity,
        path = %normalized,
        "Checking admission"
    );

    // A bug in the pipeline must never become a self-inflicted denial of
    // service: admit non-auth traffic, keep auth fail-closed.
    let decision = match AssertUnwindSafe(ctrl.decide(&key, class, policy, now))
        .catch_unwind()
        .await
    {
        Ok(decision) => decision,
        Err(_) => {
            error!(
                class = %class.as_str(),
                key = %key,
                "Admission pipeline panicked"
            );
            if class == EndpointClass::Auth && config.fail_closed_auth {
                RateLimitDecision::denied(class, policy.requests, policy.window_secs)
            } else {
                RateLimitDecision {
                    allowed: true,
                    class,
                    limit: policy.requests,
                    remaining: 0,
                    reset_secs: 0,
                    retry_after: 0,
                }
            }
        }
    };

    if !decision.allowed {
        debug!(
            class = %class.as_str(),
            identity = %identity,
            retry_after = decision.retry_after,
            "Request rejected"
        );
        return Err(AdmissionError::LimitExceeded(decision));
    }

    let mut response = next.run(request).await;
    decorate_response(&mut response, &decision);
    Ok(response)
}
