// crates/server/src/routes/health.rs
//! Health check endpoint for the gateway.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Response for the health check endpoint.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Base URL of the upstream execution service this gateway fronts.
    pub upstream: String,
    /// Jobs currently queued or running.
    pub active_jobs: usize,
}

/// GET /api/health - Health check endpoint.
///
/// Status, version, uptime, the configured upstream, and a count of the
/// work in flight. On the public allow-list.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let active_jobs = state
        .registry
        .jobs()
        .iter()
        .filter(|job| !job.is_terminal())
        .count();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        upstream: state.config.upstream_base.clone(),
        active_jobs,
    })
}

/// Create the health routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticKeyStore;
    use crate::config::GatewayConfig;
    use hostwarden_core::JobType;

    fn test_state() -> Arc<AppState> {
        AppState::new(
            GatewayConfig::for_upstream("http://upstream:9000", "secret"),
            Arc::new(StaticKeyStore::new()),
        )
    }

    #[tokio::test]
    async fn test_health_counts_only_active_jobs() {
        let state = test_state();
        let running = state.registry.create(JobType::Backup, "host-a");
        running.start().unwrap();
        let finished = state.registry.create(JobType::Restore, "host-b");
        finished.fail("disk full").unwrap();

        let Json(health) = health_check(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.upstream, "http://upstream:9000");
        assert_eq!(health.active_jobs, 1);
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            version: "0.4.0".to_string(),
            uptime_secs: 42,
            upstream: "http://upstream:9000".to_string(),
            active_jobs: 2,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
        assert!(json.contains("\"active_jobs\":2"));
    }
}
