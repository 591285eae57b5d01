//! Client IP extraction for visit logging
//!
//! The visitor address is taken from the first `X-Forwarded-For` entry when a
//! proxy supplied one, then from the socket peer address, and is the literal
//! `"unknown"` when neither is available.

use axum::http::HeaderMap;
use std::net::SocketAddr;

pub const UNKNOWN_IP: &str = "unknown";

/// Extract the client IP address as recorded on a visit
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = first_forwarded_for(headers) {
        return ip;
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

/// First entry of `X-Forwarded-For`, as sent by the outermost proxy
fn first_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = xff.split(',').next()?.trim();

    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}
