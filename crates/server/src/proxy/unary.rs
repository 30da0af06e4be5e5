// crates/server/src/proxy/unary.rs
//! Unary proxy: forward one request, relay exactly one response.
//!
//! Method, path (rewritten onto the upstream root), query string, and
//! body pass through verbatim. The request body is streamed into the
//! upstream call rather than buffered, so large uploads cost one copy,
//! not two.

use axum::{body::Body, extract::Request, response::Response};

use crate::error::ApiError;
use crate::state::AppState;

use super::{outbound_headers, response_headers};

pub async fn forward(state: &AppState, req: Request) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();
    let url = state
        .config
        .upstream_url(parts.uri.path(), parts.uri.query());

    tracing::debug!(method = %parts.method, url = %url, "Proxying unary request");

    // The timeout covers connect + response headers only; the relayed
    // body streams for as long as it takes.
    let send = state
        .client
        .request(parts.method.clone(), &url)
        .headers(outbound_headers(&parts.headers, &state.config))
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send();
    let upstream = match tokio::time::timeout(state.config.upstream_timeout, send).await {
        Ok(result) => result.map_err(|e| {
            if e.is_timeout() {
                ApiError::UpstreamTimeout(e.to_string())
            } else {
                ApiError::UpstreamUnavailable(e.to_string())
            }
        })?,
        Err(_) => {
            return Err(ApiError::UpstreamTimeout(format!(
                "no response headers within {:?}",
                state.config.upstream_timeout
            )));
        }
    };

    let status = upstream.status();
    let headers = response_headers(upstream.headers());

    // Status passes through untouched, including upstream errors: a 500
    // from the execution service is the execution service's 500, not ours.
    let mut response = Response::builder()
        .status(status)
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))?;
    *response.headers_mut() = headers;

    Ok(response)
}
