//! SQLite job store implementation
//!
//! This module provides a SQLite-based implementation of the JobStore trait.

use crate::state::{JobStatus, LogLevel};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobStore, StoreError, StoreResult};
use crate::storage::{JobRecord, JobUpdate, LogEntry};
use crate::ExportError;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const JOB_COLUMNS: &str = "id, submitter_id, target_url, status, progress, storage_path, \
                           error_message, created_at, updated_at";

/// SQLite job/log store
///
/// A single connection guarded by a mutex; every operation is a short
/// synchronous statement, so the lock is never held across an await.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Opens (or creates) the job store at `path`
    pub fn new(path: &Path) -> Result<Self, ExportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store
    pub fn open_in_memory() -> Result<Self, ExportError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("job store lock poisoned".to_string()))
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let status: String = row.get(3)?;
    let progress: i64 = row.get(4)?;
    Ok(JobRecord {
        id: row.get(0)?,
        submitter_id: row.get(1)?,
        target_url: row.get(2)?,
        status: JobStatus::from_db_string(&status).unwrap_or(JobStatus::Pending),
        progress: progress.clamp(0, 100) as u8,
        storage_path: row.get(5)?,
        error_message: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Computes the column values a guarded update writes
///
/// Returns `(status, progress, storage_path, error_message)`.
fn apply_update(
    job_id: &str,
    current: &JobRecord,
    update: JobUpdate,
) -> StoreResult<(JobStatus, u8, Option<String>, Option<String>)> {
    let JobUpdate {
        status,
        progress,
        storage_path,
        error_message,
    } = update;

    if let Some(p) = progress {
        if p > 100 {
            return Err(StoreError::ConstraintViolation(format!(
                "progress {} out of range for job {}",
                p, job_id
            )));
        }
    }

    let next = match status {
        Some(next) => {
            if !current.status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    job_id: job_id.to_string(),
                    from: current.status,
                    to: next,
                });
            }
            next
        }
        None => current.status,
    };

    if storage_path.is_some() && next != JobStatus::Completed {
        return Err(StoreError::ConstraintViolation(format!(
            "storage_path may only be set on a completed job ({})",
            job_id
        )));
    }
    if error_message.is_some() && next != JobStatus::Failed {
        return Err(StoreError::ConstraintViolation(format!(
            "error_message may only be set on a failed job ({})",
            job_id
        )));
    }

    match status {
        Some(JobStatus::Processing) => {
            // A fresh execution starts over.
            Ok((next, progress.unwrap_or(0), None, None))
        }
        Some(JobStatus::Completed) => {
            let path = storage_path.ok_or_else(|| {
                StoreError::ConstraintViolation(format!(
                    "completed job {} requires a storage_path",
                    job_id
                ))
            })?;
            Ok((next, 100, Some(path), None))
        }
        Some(JobStatus::Failed) => {
            let message = error_message.ok_or_else(|| {
                StoreError::ConstraintViolation(format!(
                    "failed job {} requires an error_message",
                    job_id
                ))
            })?;
            let progress = progress.unwrap_or(current.progress);
            Ok((next, progress, None, Some(message)))
        }
        Some(JobStatus::Pending) | None => {
            let progress = progress
                .map(|p| p.max(current.progress))
                .unwrap_or(current.progress);
            Ok((
                next,
                progress,
                current.storage_path.clone(),
                current.error_message.clone(),
            ))
        }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    // ===== Job Records =====

    async fn create_job(
        &self,
        job_id: &str,
        submitter_id: &str,
        target_url: &str,
    ) -> StoreResult<JobRecord> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO jobs (id, submitter_id, target_url, status, progress, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
            params![
                job_id,
                submitter_id,
                target_url,
                JobStatus::Pending.to_db_string(),
                now
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::DuplicateJob(job_id.to_string()));
        }

        Ok(JobRecord {
            id: job_id.to_string(),
            submitter_id: submitter_id.to_string(),
            target_url: target_url.to_string(),
            status: JobStatus::Pending,
            progress: 0,
            storage_path: None,
            error_message: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    async fn get_job(&self, job_id: &str) -> StoreResult<Option<JobRecord>> {
        let conn = self.lock()?;
        let job = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    async fn update_job(&self, job_id: &str, update: JobUpdate) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = tx
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                job_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))?;

        let (status, progress, storage_path, error_message) =
            apply_update(job_id, &current, update)?;

        tx.execute(
            "UPDATE jobs SET status = ?1, progress = ?2, storage_path = ?3, error_message = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                progress as i64,
                storage_path,
                error_message,
                Utc::now().to_rfc3339(),
                job_id
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn list_jobs(&self, limit: usize) -> StoreResult<Vec<JobRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(params![limit as i64], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    async fn list_unstarted_jobs(&self) -> StoreResult<Vec<JobRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM jobs WHERE status = ?1 AND progress = 0 ORDER BY created_at, rowid",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(params![JobStatus::Pending.to_db_string()], job_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    // ===== Logs =====

    async fn append_log(&self, job_id: &str, level: LogLevel, message: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO logs (job_id, level, message, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                job_id,
                level.to_db_string(),
                message,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    async fn get_logs(&self, job_id: &str) -> StoreResult<Vec<LogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, job_id, level, message, created_at FROM logs WHERE job_id = ?1 ORDER BY id",
        )?;
        let logs = stmt
            .query_map(params![job_id], |row| {
                let level: String = row.get(2)?;
                Ok(LogEntry {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    level: LogLevel::from_db_string(&level).unwrap_or(LogLevel::Info),
                    message: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}
