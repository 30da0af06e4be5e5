// crates/server/src/state.rs
//! Application state for the Axum gateway.

use std::sync::Arc;
use std::time::Instant;

use hostwarden_core::JobRegistry;

use crate::auth::CredentialStore;
use crate::config::GatewayConfig;
use crate::ingest::JobIngest;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Explicit gateway configuration (upstream base, secrets, allow-list).
    pub config: GatewayConfig,
    /// Credential lookups (external collaborator behind a trait).
    pub credentials: Arc<dyn CredentialStore>,
    /// Canonical job state. Read-only from the client-facing routes;
    /// written via the internal ingest routes.
    pub registry: Arc<JobRegistry>,
    /// Writer handles for the internal ingest routes.
    pub ingest: JobIngest,
    /// Shared HTTP client for upstream requests. reqwest clients pool
    /// connections internally, so one per process is correct.
    pub client: reqwest::Client,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(config: GatewayConfig, credentials: Arc<dyn CredentialStore>) -> Arc<Self> {
        let registry = Arc::new(JobRegistry::new());
        Arc::new(Self {
            start_time: Instant::now(),
            config,
            credentials,
            registry: registry.clone(),
            ingest: JobIngest::new(registry),
            client: reqwest::Client::new(),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
