// crates/core/src/job.rs
//! Types for tracked host operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a job. Assigned by the registry at creation,
/// never reused.
pub type JobId = u64;

/// Category of work a job represents. Opaque to the gateway beyond
/// routing and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    Backup,
    Restore,
    Archive,
    PackageInstall,
    Migration,
}

/// Status of a job. Transitions are monotonic along
/// `Queued -> Running -> {Succeeded | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Point-in-time snapshot of a job, as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    /// Name of the host/server resource the job acts on.
    pub target: String,
    pub status: JobStatus,
    /// Integer percentage, 0-100. Meaningful only while running; frozen
    /// at its last value after completion.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure detail. Non-empty exactly when `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set exactly when the job enters a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn new(id: JobId, job_type: JobType, target: String) -> Self {
        Self {
            id,
            job_type,
            target,
            status: JobStatus::Queued,
            progress: 0,
            message: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
