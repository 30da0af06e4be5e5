// crates/server/src/proxy/mod.rs
//! Forwarding to the upstream execution service.
//!
//! Two shapes, chosen by `classify`: a unary proxy (one request, one
//! response) and a stream proxy (one long-lived upstream response pumped
//! frame-by-frame to the client). Both inject the server-held upstream
//! secret and strip the caller's own credentials — credentials never
//! cross the trust boundary in either direction.

pub mod stream;
pub mod unary;

use axum::http::{HeaderMap, HeaderValue};

use crate::config::{GatewayConfig, API_KEY_HEADER, INTERNAL_KEY_HEADER};

/// Headers that describe one hop, never forwarded through a proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Credential-bearing headers, stripped in both directions.
const CREDENTIALS: &[&str] = &[API_KEY_HEADER, "authorization", INTERNAL_KEY_HEADER];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

fn is_credential(name: &str) -> bool {
    CREDENTIALS.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Headers for the outbound upstream request: the caller's headers minus
/// hop-by-hop and credentials, plus the injected upstream secret.
pub(crate) fn outbound_headers(inbound: &HeaderMap, config: &GatewayConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in inbound {
        if is_hop_by_hop(name.as_str()) || is_credential(name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    if let Ok(secret) = HeaderValue::from_str(&config.internal_key) {
        headers.insert(INTERNAL_KEY_HEADER, secret);
    }
    headers
}

/// Headers relayed back to the client: upstream's headers minus
/// hop-by-hop and anything credential-shaped.
pub(crate) fn response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if is_hop_by_hop(name.as_str()) || is_credential(name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}
