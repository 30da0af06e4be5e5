//! API route handlers for the hostwarden gateway.

pub mod health;
pub mod hosts;
pub mod internal;
pub mod jobs;

use std::sync::Arc;

use axum::{middleware, Router};

use crate::auth::{require_auth, require_internal};
use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health                           - Health check (public)
/// - GET  /api/jobs                             - All job snapshots
/// - GET  /api/jobs/{id}                        - Single job snapshot
/// - GET  /api/jobs/{id}/stream                 - SSE of one job
/// - GET  /api/jobs/stream                      - SSE of all job updates
/// - ANY  /api/hosts/{*path}                    - Proxied host operations
/// - ANY  /api/servers/{*path}                  - Proxied server operations
/// - POST /api/internal/jobs                    - Ingest: register job
/// - POST /api/internal/jobs/{id}/transition    - Ingest: apply transition
///
/// Everything except /api/internal sits behind the auth gateway; the
/// gateway itself lets allow-listed paths (health) through. The internal
/// routes take the execution service's shared secret instead.
pub fn api_routes(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .nest("/api", hosts::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let internal = Router::new()
        .nest("/api/internal", internal::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_internal));

    Router::new().merge(gated).merge(internal).with_state(state)
}
