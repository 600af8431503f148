//! Job store trait and error types
//!
//! The job/log store is shared by every concurrent execution. All writes
//! are scoped to a single job id, so implementations never need cross-job
//! coordination.

use crate::state::{JobStatus, LogLevel};
use crate::storage::{JobRecord, JobUpdate, LogEntry};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during job store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already exists: {0}")]
    DuplicateJob(String),

    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for job store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for job/log store implementations
///
/// Invariants every implementation enforces on `update_job`:
/// - status changes follow [`JobStatus::can_transition_to`]
/// - `storage_path` is set exactly when status is `completed`
/// - `error_message` is set exactly when status is `failed`
/// - progress never decreases unless the job (re-)enters `processing`
#[async_trait]
pub trait JobStore: Send + Sync {
    // ===== Job Records =====

    /// Creates a `pending` job with progress 0
    async fn create_job(
        &self,
        job_id: &str,
        submitter_id: &str,
        target_url: &str,
    ) -> StoreResult<JobRecord>;

    /// Gets a job by ID
    async fn get_job(&self, job_id: &str) -> StoreResult<Option<JobRecord>>;

    /// Applies a partial update to a job
    async fn update_job(&self, job_id: &str, update: JobUpdate) -> StoreResult<()>;

    /// Lists the most recently created jobs, newest first
    async fn list_jobs(&self, limit: usize) -> StoreResult<Vec<JobRecord>>;

    /// Jobs that are still `pending` with progress 0 (never picked up)
    async fn list_unstarted_jobs(&self) -> StoreResult<Vec<JobRecord>>;

    // ===== Logs =====

    /// Appends a log entry for a job
    async fn append_log(&self, job_id: &str, level: LogLevel, message: &str) -> StoreResult<()>;

    /// Gets all log entries of a job in emission order
    async fn get_logs(&self, job_id: &str) -> StoreResult<Vec<LogEntry>>;
}
