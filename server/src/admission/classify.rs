//! Endpoint classification.
//!
//! Pure function of (method, normalized path). Precedence: health markers,
//! then auth markers, then mutating verbs. An auth-prefixed mutating endpoint
//! must classify as `Auth`, not `Write`, because `Auth` carries the
//! fail-closed policy.

use axum::http::Method;

use crate::admission::EndpointClass;

/// Path segments identifying health and metrics probes.
const HEALTH_MARKERS: &[&str] = &[
    "health", "healthz", "ready", "readyz", "readiness", "live", "livez", "liveness", "metrics",
];

/// Path segments identifying authentication-class endpoints.
const AUTH_MARKERS: &[&str] = &["login", "signin", "signup", "register", "token", "password"];

/// Markers match whole path segments, so `/api/livestock` is not a health
/// probe and `/api/shipping` is not a ping.
fn has_marker(path: &str, markers: &[&str]) -> bool {
    path.split('/').any(|segment| markers.contains(&segment))
}

/// Classifies a request into a traffic class.
///
/// The same (method, normalized path) pair always yields the same class.
pub fn classify(method: &Method, normalized_path: &str) -> EndpointClass {
    let path = normalized_path.to_ascii_lowercase();

    if has_marker(&path, HEALTH_MARKERS) {
        return EndpointClass::Health;
    }
    if has_marker(&path, AUTH_MARKERS) {
        return EndpointClass::Auth;
    }
    if [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method) {
        return EndpointClass::Write;
    }
    EndpointClass::Read
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_markers() {
        assert_eq!(classify(&Method::GET, "/healthz"), EndpointClass::Health);
        assert_eq!(classify(&Method::GET, "/readyz"), EndpointClass::Health);
        assert_eq!(classify(&Method::GET, "/metrics"), EndpointClass::Health);
        assert_eq!(
            classify(&Method::GET, "/api/livez"),
            EndpointClass::Health
        );
    }

    #[test]
    fn test_auth_markers() {
        assert_eq!(
            classify(&Method::POST, "/api/auth/login"),
            EndpointClass::Auth
        );
        assert_eq!(
            classify(&Method::POST, "/api/auth/register"),
            EndpointClass::Auth
        );
        assert_eq!(
            classify(&Method::POST, "/api/auth/token/refresh"),
            EndpointClass::Auth
        );
        assert_eq!(
            classify(&Method::PUT, "/api/users/password"),
            EndpointClass::Auth
        );
    }

    #[test]
    fn test_auth_takes_precedence_over_write() {
        // A mutating verb on an auth path is still Auth
        assert_eq!(
            classify(&Method::DELETE, "/api/auth/token"),
            EndpointClass::Auth
        );
    }

    #[test]
    fn test_mutating_verbs_are_write() {
        assert_eq!(classify(&Method::POST, "/api/fields"), EndpointClass::Write);
        assert_eq!(
            classify(&Method::PUT, "/api/fields/42"),
            EndpointClass::Write
        );
        assert_eq!(
            classify(&Method::PATCH, "/api/sensors/7"),
            EndpointClass::Write
        );
        assert_eq!(
            classify(&Method::DELETE, "/api/fields/42"),
            EndpointClass::Write
        );
    }

    #[test]
    fn test_markers_match_whole_segments_only() {
        // Substrings of ordinary resource names must not reclassify them
        assert_eq!(
            classify(&Method::GET, "/api/livestock"),
            EndpointClass::Read
        );
        assert_eq!(classify(&Method::GET, "/api/shipping"), EndpointClass::Read);
        assert_eq!(
            classify(&Method::POST, "/api/livestock"),
            EndpointClass::Write
        );
        assert_eq!(
            classify(&Method::GET, "/api/tokenized-assets"),
            EndpointClass::Read
        );
    }

    #[test]
    fn test_everything_else_is_read() {
        assert_eq!(classify(&Method::GET, "/api/fields"), EndpointClass::Read);
        assert_eq!(classify(&Method::HEAD, "/api/fields"), EndpointClass::Read);
        assert_eq!(
            classify(&Method::OPTIONS, "/api/fields"),
            EndpointClass::Read
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(
                classify(&Method::POST, "/api/auth/login"),
                EndpointClass::Auth
            );
        }
    }
}
