// crates/core/src/lib.rs
//! Hostwarden core library.
//!
//! Job data model and the in-memory job registry: the canonical state of
//! every tracked host operation (backups, restores, package installs,
//! migrations). Transport-agnostic — the HTTP gateway lives in
//! `hostwarden-server`.

pub mod job;
pub mod registry;

pub use job::{Job, JobId, JobStatus, JobType};
pub use registry::{JobRegistry, JobWriter, RegistryError};
