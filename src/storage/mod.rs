//! Storage module for job and log records
//!
//! This module handles all database operations for job bookkeeping:
//! - SQLite database initialization and schema management
//! - Job record creation and guarded status updates
//! - Append-only per-job logs

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteJobStore;
pub use traits::{JobStore, StoreError, StoreResult};

use crate::state::{JobStatus, LogLevel};
use serde::Serialize;

/// A job as recorded in the job store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub submitter_id: String,
    pub target_url: String,
    #[serde(serialize_with = "serialize_status")]
    pub status: JobStatus,
    pub progress: u8,
    pub storage_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn serialize_status<S: serde::Serializer>(status: &JobStatus, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(status.to_db_string())
}

/// A single log line of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: i64,
    pub job_id: String,
    pub level: LogLevel,
    pub message: String,
    pub created_at: String,
}

/// Partial update applied to a job record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub storage_path: Option<String>,
    pub error_message: Option<String>,
}

impl JobUpdate {
    /// Job (re-)enters processing with progress reset to 0
    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(0),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed(storage_path: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            storage_path: Some(storage_path.into()),
            error_message: None,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(error_message.into()),
            ..Self::default()
        }
    }
}
