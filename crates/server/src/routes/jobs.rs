// crates/server/src/routes/jobs.rs
//! Job inspection endpoints (REST + SSE).
//!
//! - `GET /api/jobs`              -- All job snapshots, most recent first
//! - `GET /api/jobs/{id}`         -- Single job snapshot
//! - `GET /api/jobs/{id}/stream`  -- SSE of one job's state changes
//! - `GET /api/jobs/stream`       -- SSE of every job update (global feed)
//!
//! A failed job is not an error on these routes: it arrives as a normal
//! terminal snapshot with its `error` field set. Transport errors (404,
//! 502) are the only thing reported through `ApiError`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use hostwarden_core::{Job, JobId};
use tokio_stream::StreamExt;

use crate::error::ApiResult;
use crate::state::AppState;

/// Build the jobs sub-router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/stream", get(stream_all_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/stream", get(stream_job))
}

/// GET /api/jobs -- All job snapshots, most recently started first.
async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<Job>> {
    let mut jobs = state.registry.jobs();
    jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Json(jobs)
}

/// GET /api/jobs/{id} -- Point-in-time snapshot, or 404.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.registry.get(id)?))
}

/// GET /api/jobs/{id}/stream -- SSE of one job's state changes.
///
/// The first frame is the state at subscription time; the stream ends
/// after the terminal snapshot. Subscribing to an already-terminal job
/// yields exactly that one frame. An unknown id fails with 404 before
/// any frame is sent.
async fn stream_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>> {
    let snapshots = state.registry.subscribe(id)?;

    let stream = snapshots.map(|job| {
        let json = serde_json::to_string(&job).unwrap_or_default();
        Ok(Event::default().event("job").data(json))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

/// GET /api/jobs/stream -- SSE of every job update.
///
/// On connect the client is hydrated with a snapshot of all known jobs,
/// then receives each subsequent change. A lagging client gets the full
/// snapshot again rather than a gap.
async fn stream_all_jobs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.registry.watch_all();
    let registry = state.registry.clone();

    let stream = async_stream::stream! {
        for job in registry.jobs() {
            yield Ok(job_event(&job));
        }

        loop {
            match rx.recv().await {
                Ok(job) => yield Ok(job_event(&job)),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("SSE client lagged by {} job updates, re-sending snapshots", n);
                    for job in registry.jobs() {
                        yield Ok(job_event(&job));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

fn job_event(job: &Job) -> Event {
    Event::default()
        .event("job")
        .data(serde_json::to_string(job).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticKeyStore;
    use crate::config::GatewayConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use hostwarden_core::JobType;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        AppState::new(
            GatewayConfig::for_upstream("http://upstream:9000", "secret"),
            Arc::new(StaticKeyStore::new()),
        )
    }

    #[tokio::test]
    async fn test_list_jobs_empty() {
        let state = test_state();
        let app = router().with_state(state);

        let response = app
            .oneshot(Request::builder().uri("/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert!(json.is_empty());
    }

    #[tokio::test]
    async fn test_get_job_snapshot() {
        let state = test_state();
        let writer = state.registry.create(JobType::Backup, "valheim-eu-1");
        writer.start().unwrap();
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/jobs/{}", writer.id()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["target"], "valheim-eu-1");
    }

    #[tokio::test]
    async fn test_get_unknown_job_is_404() {
        let app = router().with_state(test_state());

        let response = app
            .oneshot(Request::builder().uri("/jobs/999").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stream_unknown_job_is_404_with_no_frames() {
        let app = router().with_state(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/jobs/999/stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        // The error body is JSON, not a partial event stream.
        let content_type = response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("application/json"));
    }

    #[tokio::test]
    async fn test_stream_terminal_job_yields_single_frame() {
        let state = test_state();
        let writer = state.registry.create(JobType::Backup, "host");
        writer.start().unwrap();
        writer.succeed().unwrap();
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/jobs/{}/stream", writer.id()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
        // The subscription is already terminal, so the stream ends after
        // one frame and the body can be read to completion.
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text.matches("event: job").count(), 1);
        assert!(text.contains("\"status\":\"succeeded\""));
    }
}
