// crates/server/src/routes/hosts.rs
//! Host- and server-level operations, forwarded to the execution service.
//!
//! - `ANY /api/hosts/{*path}`    -- backup/restore triggers, package
//!   installs, file transfers, host settings
//! - `ANY /api/servers/{*path}`  -- process control, console, metrics
//!
//! One dispatch point: classify the request (unary vs. stream), then hand
//! it to the matching proxy. The gateway adds nothing to these routes
//! beyond auth, classification, and credential injection.

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Request, State},
    response::Response,
    routing::any,
    Router,
};

use crate::classify::{classify, ProxyKind};
use crate::error::ApiResult;
use crate::proxy;
use crate::state::AppState;

/// Build the proxied operations sub-router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/hosts/{*path}", any(dispatch))
        .route("/servers/{*path}", any(dispatch))
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    mut req: Request,
) -> ApiResult<Response> {
    // Nesting strips the /api prefix; the upstream expects the full path.
    *req.uri_mut() = uri;

    match classify(req.uri().path(), req.headers()) {
        ProxyKind::Unary => proxy::unary::forward(&state, req).await,
        ProxyKind::Stream => proxy::stream::forward(&state, req).await,
    }
}
