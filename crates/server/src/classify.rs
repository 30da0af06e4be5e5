// crates/server/src/classify.rs
//! Request classification: unary vs. streaming proxy handling.
//!
//! Pure function over method-line data (path + headers). The body is never
//! inspected: streaming requests are long-lived and must not be buffered
//! to make a routing decision.

use axum::http::{header::ACCEPT, HeaderMap};

/// Media type for the event-frame stream format.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Reserved path suffix marking a streaming resource.
const STREAM_SUFFIX: &str = "/stream";

/// Live-data resources reachable without the `/stream` suffix.
const LIVE_SUFFIXES: &[&str] = &["/console/tail", "/metrics/live"];

/// How a proxied request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// One request, one response, forwarded as-is.
    Unary,
    /// Long-lived upstream response pumped frame-by-frame downstream.
    Stream,
}

/// Classify a request. `Stream` if any of:
/// - the client accepts `text/event-stream`
/// - the path ends with the reserved `/stream` suffix
/// - the path targets a known live-data resource
pub fn classify(path: &str, headers: &HeaderMap) -> ProxyKind {
    let accepts_events = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(EVENT_STREAM));

    if accepts_events
        || path.ends_with(STREAM_SUFFIX)
        || LIVE_SUFFIXES.iter().any(|s| path.ends_with(s))
    {
        ProxyKind::Stream
    } else {
        ProxyKind::Unary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(accept: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(v) = accept {
            map.insert(ACCEPT, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_classification_table() {
        let cases = [
            // (path, accept, expected)
            ("/api/hosts/h1/backup", None, ProxyKind::Unary),
            ("/api/servers/s1/start", Some("application/json"), ProxyKind::Unary),
            ("/api/servers/s1/console/tail", None, ProxyKind::Stream),
            ("/api/servers/s1/metrics/live", None, ProxyKind::Stream),
            ("/api/hosts/h1/backup/stream", None, ProxyKind::Stream),
            ("/api/hosts/h1/files/upload", None, ProxyKind::Unary),
            (
                "/api/hosts/h1/status",
                Some("text/event-stream"),
                ProxyKind::Stream,
            ),
            (
                "/api/hosts/h1/status",
                Some("application/json, text/event-stream"),
                ProxyKind::Stream,
            ),
        ];
        for (path, accept, expected) in cases {
            assert_eq!(
                classify(path, &headers(accept)),
                expected,
                "path={path} accept={accept:?}"
            );
        }
    }

    #[test]
    fn test_stream_suffix_must_terminate_path() {
        // "stream" in the middle of a path is not the reserved suffix.
        assert_eq!(
            classify("/api/servers/stream-deck/status", &headers(None)),
            ProxyKind::Unary
        );
    }
}
