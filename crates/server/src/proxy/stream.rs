// crates/server/src/proxy/stream.rs
//! Stream proxy: bridge one long-lived upstream response to one
//! downstream client connection.
//!
//! Session lifecycle: `Opening -> Streaming -> {Closed-Clean |
//! Closed-Error | Closed-ClientAbort}`.
//!
//! - Opening: the upstream request is completed (status checked) before a
//!   single downstream byte is written, so a refused upstream becomes a
//!   clean `502` and the client never observes a half-open stream. The
//!   opening phase is bounded by the configured upstream timeout; a
//!   silent upstream becomes a `504`.
//! - Streaming: each upstream chunk is yielded to the downstream body
//!   unbuffered — no coalescing, no reordering, one chunk flushed before
//!   the next read.
//! - Closed-ClientAbort: when the client disconnects, hyper drops the
//!   response body; dropping the pump stream drops the upstream
//!   `reqwest::Response`, which aborts the upstream read on its next
//!   poll. An abandoned client never leaks an open upstream connection.
//! - Closed-Error: an upstream failure mid-stream delivers one terminal
//!   `error` frame, then ends the body.
//! - No retries here: a client that wants continuity re-subscribes and
//!   receives current state, not missed history.

use axum::{
    body::Body,
    extract::Request,
    http::{
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
        StatusCode,
    },
    response::Response,
};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::classify::EVENT_STREAM;
use crate::error::ApiError;
use crate::state::AppState;

use super::outbound_headers;

/// Terminal frame sent downstream when the upstream dies mid-stream.
const ABORT_FRAME: &str = "event: error\ndata: {\"error\":\"upstream stream aborted\"}\n\n";

pub async fn forward(state: &AppState, req: Request) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();
    let url = state
        .config
        .upstream_url(parts.uri.path(), parts.uri.query());

    tracing::debug!(method = %parts.method, url = %url, "Opening upstream stream");

    // The timeout bounds the Opening phase only; once headers arrive the
    // stream lives as long as both sides keep it open.
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

    if !upstream.status().is_success() {
        return Err(ApiError::UpstreamUnavailable(format!(
            "upstream returned {}",
            upstream.status()
        )));
    }

    // Pump loop. The stream owns the upstream response, so downstream
    // disconnect (body dropped) releases the upstream connection within
    // one iteration.
    let pump = async_stream::stream! {
        let mut upstream = upstream.bytes_stream();
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => yield Ok::<Bytes, std::convert::Infallible>(bytes),
                Err(e) => {
                    tracing::warn!(error = %e, "Upstream stream aborted mid-flight");
                    yield Ok(Bytes::from_static(ABORT_FRAME.as_bytes()));
                    break;
                }
            }
        }
        tracing::debug!("Upstream stream closed");
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, EVENT_STREAM)
        .header(CACHE_CONTROL, "no-cache")
        .header(CONNECTION, "keep-alive")
        // Disable intermediary (nginx) buffering so frames flush promptly.
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(pump))
        .map_err(|e| ApiError::Internal(format!("failed to build stream response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_frame_is_a_terminated_event() {
        // One labeled frame, blank-line terminated, parseable payload.
        assert!(ABORT_FRAME.starts_with("event: error\n"));
        assert!(ABORT_FRAME.ends_with("\n\n"));
        let data = ABORT_FRAME
            .lines()
            .find_map(|l| l.strip_prefix("data: "))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(data).unwrap();
        assert!(value["error"].is_string());
    }
}
