// crates/server/src/lib.rs
//! Hostwarden server library.
//!
//! Axum-based HTTP gateway for managed game-server hosts: authenticates
//! clients, tracks long-running host operations as jobs, and proxies
//! unary and streaming requests to the upstream execution service.

pub mod auth;
pub mod classify;
pub mod config;
pub mod error;
pub mod ingest;
pub mod proxy;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, jobs, proxied host/server operations, ingest)
/// - CORS for panel frontends (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
