// crates/server/src/ingest.rs
//! Job ingest: how execution-service reports become registry writes.
//!
//! The registry hands out exactly one [`JobWriter`] per job; this module
//! owns those writers and applies transition requests arriving on the
//! internal HTTP routes. Client-facing routes never touch a writer.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use hostwarden_core::{Job, JobId, JobRegistry, JobStatus, JobType, JobWriter};
use serde::Deserialize;

use crate::error::ApiError;

/// A state change reported by the execution service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub error: Option<String>,
}

pub struct JobIngest {
    registry: Arc<JobRegistry>,
    writers: RwLock<HashMap<JobId, JobWriter>>,
}

impl JobIngest {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self {
            registry,
            writers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a newly-accepted unit of work. Returns the initial
    /// `queued` snapshot.
    pub fn create(&self, job_type: JobType, target: impl Into<String>) -> Job {
        let writer = self.registry.create(job_type, target);
        let snapshot = writer.snapshot();
        match self.writers.write() {
            Ok(mut writers) => {
                writers.insert(writer.id(), writer);
            }
            Err(e) => tracing::error!("RwLock poisoned writing writers map: {e}"),
        }
        snapshot
    }

    /// Apply a reported transition. Field order matters so that a single
    /// request can carry `running` + progress + message, or a terminal
    /// status + error, and land as one coherent change sequence.
    pub fn transition(&self, id: JobId, req: TransitionRequest) -> Result<Job, ApiError> {
        if req.error.is_some() && req.status != Some(JobStatus::Failed) {
            return Err(ApiError::BadRequest(
                "error detail requires status=failed".to_string(),
            ));
        }
        if req.progress.is_some_and(|p| p > 100) {
            return Err(ApiError::BadRequest("progress must be 0-100".to_string()));
        }

        let writers = match self.writers.read() {
            Ok(writers) => writers,
            Err(e) => {
                tracing::error!("RwLock poisoned reading writers map: {e}");
                return Err(ApiError::Internal("writer map unavailable".to_string()));
            }
        };
        let writer = writers.get(&id).ok_or(ApiError::JobNotFound(id))?;

        if req.status == Some(JobStatus::Running) {
            writer.start()?;
        }
        if let Some(pct) = req.progress {
            writer.progress(pct)?;
        }
        if let Some(message) = req.message {
            writer.message(message)?;
        }
        match req.status {
            Some(JobStatus::Succeeded) => writer.succeed()?,
            Some(JobStatus::Failed) => {
                let detail = req
                    .error
                    .filter(|e| !e.is_empty())
                    .ok_or_else(|| {
                        ApiError::BadRequest("status=failed requires error detail".to_string())
                    })?;
                writer.fail(detail)?;
            }
            Some(JobStatus::Queued) => {
                return Err(ApiError::BadRequest(
                    "jobs are created queued; cannot transition to queued".to_string(),
                ));
            }
            Some(JobStatus::Running) | None => {}
        }

        Ok(writer.snapshot())
    }
}
