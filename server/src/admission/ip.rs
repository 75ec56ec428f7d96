//! Client identity resolution.
//!
//! Forwarded-address headers are only believed when the direct peer is on
//! the trusted-proxy list; an untrusted client cannot spoof its own identity
//! by forging `X-Forwarded-For`.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

use crate::admission::constants::IPV6_PREFIX_SEGMENTS;

/// Resolves the client IP for a request.
///
/// When `trusted_proxies` is non-empty and the direct peer is a member,
/// takes the left-most (closest-to-client) address from `X-Forwarded-For`,
/// falling back to `X-Real-IP`. In every other case the direct peer address
/// is used and forwarded headers are ignored entirely.
pub fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trusted_proxies: &HashSet<IpAddr>,
) -> IpAddr {
    let peer = connect_info
        .map(|c| c.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if !trusted_proxies.is_empty() && trusted_proxies.contains(&peer) {
        if let Some(forwarded) = headers.get("X-Forwarded-For") {
            if let Ok(s) = forwarded.to_str() {
                if let Some(first_ip) = s.split(',').next() {
                    if let Ok(ip) = first_ip.trim().parse() {
                        return ip;
                    }
                }
            }
        }
        if let Some(real_ip) = headers.get("X-Real-IP") {
            if let Ok(s) = real_ip.to_str() {
                if let Ok(ip) = s.trim().parse() {
                    return ip;
                }
            }
        }
    }

    peer
}

/// Normalizes an IP address into a rate-limit identity string.
///
/// IPv4 addresses are kept as-is. IPv6 addresses are collapsed to their /64
/// prefix so one allocation cannot dodge its window by rotating addresses.
pub fn normalize_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => {
            let seg = v6.segments();
            let prefix: Vec<String> = (0..IPV6_PREFIX_SEGMENTS)
                .map(|i| format!("{:x}", seg[i]))
                .collect();
            format!("{}::/64", prefix.join(":"))
        }
    }
}
