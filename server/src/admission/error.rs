//! Admission-control error types for HTTP responses.

use axum::http::header::HeaderValue;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::admission::constants::{
    HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET, HEADER_RETRY_AFTER,
};
use crate::admission::{EndpointClass, RateLimitDecision};

/// Errors from the distributed counter store.
///
/// Every transport, command, and timeout failure collapses into
/// `Unavailable`; the coordinator never distinguishes between them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is unreachable, timed out, or returned a command error.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that surface to the client from an admission check.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Request exceeded its class limit.
    #[error("rate limit exceeded for {} traffic", .0.class.as_str())]
    LimitExceeded(RateLimitDecision),
}

/// JSON body for a 429 rejection, bilingual (English and Arabic).
#[derive(Serialize)]
pub struct RateLimitErrorResponse {
    /// Always false on a rejection.
    pub success: bool,
    /// Machine-readable error code.
    pub error: &'static str,
    /// Arabic error code translation.
    pub error_ar: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Arabic human-readable message.
    pub message_ar: String,
    /// Seconds to wait before retrying.
    #[serde(rename = "retryAfter")]
    pub retry_after: u64,
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Traffic class the limit applies to.
    #[serde(rename = "endpointType")]
    pub endpoint_type: EndpointClass,
}

/// Writes the standard rate-limit headers onto a response.
pub fn decorate_response(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert(HEADER_LIMIT, v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert(HEADER_REMAINING, v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.reset_secs.to_string()) {
        headers.insert(HEADER_RESET, v);
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        match self {
            Self::LimitExceeded(decision) => {
                let body = RateLimitErrorResponse {
                    success: false,
                    error: "rate_limit_exceeded",
                    error_ar: "\u{062a}\u{0645} \u{062a}\u{062c}\u{0627}\u{0648}\u{0632} \u{062d}\u{062f} \u{0627}\u{0644}\u{0637}\u{0644}\u{0628}\u{0627}\u{062a}",
                    message: format!(
                        "Too many requests. Please try again in {} seconds.",
                        decision.retry_after
                    ),
                    message_ar: format!(
                        "\u{0637}\u{0644}\u{0628}\u{0627}\u{062a} \u{0643}\u{062b}\u{064a}\u{0631}\u{0629} \u{062c}\u{062f}\u{064b}\u{0627}. \u{064a}\u{0631}\u{062c}\u{0649} \u{0627}\u{0644}\u{0645}\u{062d}\u{0627}\u{0648}\u{0644}\u{0629} \u{0645}\u{0631}\u{0629} \u{0623}\u{062e}\u{0631}\u{0649} \u{0628}\u{0639}\u{062f} {} \u{062b}\u{0627}\u{0646}\u{064a}\u{0629}.",
                        decision.retry_after
                    ),
                    retry_after: decision.retry_after,
                    limit: decision.limit,
                    endpoint_type: decision.class,
                };

                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                decorate_response(&mut response, &decision);
                if let Ok(v) = HeaderValue::from_str(&decision.retry_after.to_string()) {
                    response.headers_mut().insert(HEADER_RETRY_AFTER, v);
                }
                response
            }
        }
    }
}
