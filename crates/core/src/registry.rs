// crates/core/src/registry.rs
//! Canonical in-memory state for every tracked job.
//!
//! The registry is the single source of truth for job status. Each job is
//! backed by a `tokio::sync::watch` channel, so subscribers always observe
//! the state at subscription time and each change after it, never missed
//! history. A global broadcast channel carries every change of every job
//! for the all-jobs stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_stream::Stream;

use crate::job::{Job, JobId, JobStatus, JobType};

/// Errors from registry lookups and state transitions.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("invalid transition for job {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("progress regression for job {id}: {from} -> {to}")]
    ProgressRegression { id: JobId, from: u8, to: u8 },
}

/// Central registry of all in-flight and completed jobs.
///
/// Thread-safe via `Arc` wrapping. The registry hands out exactly one
/// [`JobWriter`] per job; everything else is read-only snapshots and
/// subscriptions.
pub struct JobRegistry {
    next_id: AtomicU64,
    // Receivers, not senders: the JobWriter owns the only sender, so a
    // dropped writer closes the channel and subscriptions terminate
    // instead of hanging on an abandoned job. Snapshots stay readable.
    jobs: RwLock<HashMap<JobId, watch::Receiver<Job>>>,
    global_tx: broadcast::Sender<Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(256);
        Self {
            next_id: AtomicU64::new(1),
            jobs: RwLock::new(HashMap::new()),
            global_tx,
        }
    }

    /// Register a new `queued` job and return its writer handle.
    ///
    /// The writer is the only way to mutate the job; the registry itself
    /// never transitions state.
    pub fn create(&self, job_type: JobType, target: impl Into<String>) -> JobWriter {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let job = Job::new(id, job_type, target.into());
        let (tx, rx) = watch::channel(job.clone());

        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(id, rx);
            }
            Err(e) => tracing::error!("RwLock poisoned writing jobs map: {e}"),
        }

        // Creation is the first observable state change.
        let _ = self.global_tx.send(job);

        JobWriter {
            id,
            tx,
            global_tx: self.global_tx.clone(),
        }
    }

    /// Current snapshot of a job.
    pub fn get(&self, id: JobId) -> Result<Job, RegistryError> {
        self.receiver(id).map(|rx| rx.borrow().clone())
    }

    /// Snapshots of all known jobs, in no particular order.
    pub fn jobs(&self) -> Vec<Job> {
        match self.jobs.read() {
            Ok(jobs) => jobs.values().map(|rx| rx.borrow().clone()).collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                Vec::new()
            }
        }
    }

    /// Ordered, finite sequence of state changes for one job.
    ///
    /// The first element is always the state at subscription time; if the
    /// job is already terminal the sequence has exactly that one element.
    /// Intermediate states a slow consumer misses are coalesced to the
    /// latest (at-most-current, not at-least-once).
    pub fn subscribe(
        &self,
        id: JobId,
    ) -> Result<impl Stream<Item = Job> + Send + 'static, RegistryError> {
        let mut rx = self.receiver(id)?;

        Ok(async_stream::stream! {
            let first = rx.borrow_and_update().clone();
            let mut done = first.is_terminal();
            yield first;

            while !done {
                // Err means the writer side is gone: the job was abandoned.
                if rx.changed().await.is_err() {
                    break;
                }
                let snap = rx.borrow_and_update().clone();
                done = snap.is_terminal();
                yield snap;
            }
        })
    }

    /// Subscribe to every state change of every job (for the global SSE
    /// feed). Lagging receivers skip to newer updates, they never block
    /// the writers.
    pub fn watch_all(&self) -> broadcast::Receiver<Job> {
        self.global_tx.subscribe()
    }

    fn receiver(&self, id: JobId) -> Result<watch::Receiver<Job>, RegistryError> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(&id).cloned().ok_or(RegistryError::JobNotFound(id)),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                Err(RegistryError::JobNotFound(id))
            }
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer handle for a single job. Enforces the monotonic state machine:
/// `queued -> running -> {succeeded | failed}`, non-decreasing progress,
/// no mutation after a terminal state.
pub struct JobWriter {
    id: JobId,
    tx: watch::Sender<Job>,
    global_tx: broadcast::Sender<Job>,
}

impl JobWriter {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Current snapshot, as subscribers see it.
    pub fn snapshot(&self) -> Job {
        self.tx.borrow().clone()
    }

    /// `queued -> running`.
    pub fn start(&self) -> Result<(), RegistryError> {
        self.apply(|job| {
            if job.status != JobStatus::Queued {
                return Err(RegistryError::InvalidTransition {
                    id: job.id,
                    from: job.status,
                    to: JobStatus::Running,
                });
            }
            job.status = JobStatus::Running;
            Ok(())
        })
    }

    /// Update progress. Only valid while running; equal values are
    /// accepted (idempotent retries), regressions are rejected.
    pub fn progress(&self, pct: u8) -> Result<(), RegistryError> {
        let pct = pct.min(100);
        self.apply(|job| {
            if job.status != JobStatus::Running {
                return Err(RegistryError::InvalidTransition {
                    id: job.id,
                    from: job.status,
                    to: JobStatus::Running,
                });
            }
            if pct < job.progress {
                return Err(RegistryError::ProgressRegression {
                    id: job.id,
                    from: job.progress,
                    to: pct,
                });
            }
            job.progress = pct;
            Ok(())
        })
    }

    /// Update the human-readable status note. Valid while active.
    pub fn message(&self, text: impl Into<String>) -> Result<(), RegistryError> {
        let text = text.into();
        self.apply(move |job| {
            if job.status.is_terminal() {
                return Err(RegistryError::InvalidTransition {
                    id: job.id,
                    from: job.status,
                    to: job.status,
                });
            }
            job.message = Some(text);
            Ok(())
        })
    }

    /// Terminal success. Forces progress to 100 and stamps `completed_at`.
    pub fn succeed(&self) -> Result<(), RegistryError> {
        self.finish(JobStatus::Succeeded, None)
    }

    /// Terminal failure with detail. Stamps `completed_at`.
    pub fn fail(&self, error: impl Into<String>) -> Result<(), RegistryError> {
        self.finish(JobStatus::Failed, Some(error.into()))
    }

    fn finish(&self, to: JobStatus, error: Option<String>) -> Result<(), RegistryError> {
        self.apply(move |job| {
            if job.status.is_terminal() {
                return Err(RegistryError::InvalidTransition {
                    id: job.id,
                    from: job.status,
                    to,
                });
            }
            job.status = to;
            job.completed_at = Some(chrono::Utc::now());
            match to {
                JobStatus::Succeeded => job.progress = 100,
                JobStatus::Failed => job.error = error,
                _ => unreachable!("finish called with non-terminal status"),
            }
            Ok(())
        })
    }

    /// Run a checked mutation against the live job state. Subscribers are
    /// notified only when the mutation succeeds.
    fn apply<F>(&self, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Job) -> Result<(), RegistryError>,
    {
        let mut result = Ok(());
        self.tx.send_if_modified(|job| match f(job) {
            Ok(()) => true,
            Err(e) => {
                result = Err(e);
                false
            }
        });
        if result.is_ok() {
            let _ = self.global_tx.send(self.tx.borrow().clone());
        }
        result
    }
}
