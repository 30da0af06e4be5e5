// crates/server/src/routes/internal.rs
//! Internal ingest routes: the execution service reports job state here.
//!
//! - `POST /api/internal/jobs`                   -- Register accepted work
//! - `POST /api/internal/jobs/{id}/transition`   -- Apply a state change
//!
//! These routes sit behind `require_internal` (shared-secret trust), not
//! the client-facing auth gateway.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use hostwarden_core::{Job, JobId, JobType};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::ingest::TransitionRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobRequest {
    job_type: JobType,
    target: String,
}

/// Build the internal sub-router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/{id}/transition", post(transition_job))
}

/// POST /api/internal/jobs -- Register a newly-accepted unit of work.
async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateJobRequest>,
) -> (StatusCode, Json<Job>) {
    let job = state.ingest.create(req.job_type, req.target);
    tracing::info!(job_id = %job.id, job_type = ?job.job_type, target = %job.target, "Job registered");
    (StatusCode::CREATED, Json(job))
}

/// POST /api/internal/jobs/{id}/transition -- Apply a reported change.
///
/// Invalid transitions (terminal re-entry, progress regression) are 409;
/// malformed reports are 400; unknown jobs are 404.
async fn transition_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
    Json(req): Json<TransitionRequest>,
) -> ApiResult<Json<Job>> {
    let job = state.ingest.transition(id, req)?;
    Ok(Json(job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticKeyStore;
    use crate::config::GatewayConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        AppState::new(
            GatewayConfig::for_upstream("http://upstream:9000", "secret"),
            Arc::new(StaticKeyStore::new()),
        )
    }

    async fn post_json(
        app: Router,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_create_then_transition() {
        let state = test_state();
        let app = router().with_state(state.clone());

        let (status, job) = post_json(
            app.clone(),
            "/jobs",
            serde_json::json!({"jobType": "backup", "target": "valheim-eu-1"}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(job["status"], "queued");
        let id = job["id"].as_u64().unwrap();

        let (status, job) = post_json(
            app.clone(),
            &format!("/jobs/{id}/transition"),
            serde_json::json!({"status": "running", "progress": 25}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(job["progress"], 25);

        // The registry observed the change.
        assert_eq!(
            state.registry.get(id).unwrap().status,
            hostwarden_core::JobStatus::Running
        );
    }

    #[tokio::test]
    async fn test_invalid_transition_is_409() {
        let state = test_state();
        let id = state.ingest.create(JobType::Backup, "host").id;
        state
            .ingest
            .transition(
                id,
                TransitionRequest {
                    status: Some(hostwarden_core::JobStatus::Failed),
                    progress: None,
                    message: None,
                    error: Some("boom".to_string()),
                },
            )
            .unwrap();

        let app = router().with_state(state);
        let (status, _) = post_json(
            app,
            &format!("/jobs/{id}/transition"),
            serde_json::json!({"status": "running"}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_transition_unknown_job_is_404() {
        let app = router().with_state(test_state());
        let (status, _) = post_json(
            app,
            "/jobs/12345/transition",
            serde_json::json!({"status": "running"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
