//! SQLite work queue implementation

use crate::queue::schema::initialize_schema;
use crate::queue::traits::{QueueError, QueueResult, WorkQueue};
use crate::queue::{
    DeadItem, Delivery, FailOutcome, QueueCounts, QueueState, RetentionPolicy, RetryPolicy,
    WorkItem,
};
use crate::ExportError;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite-backed work queue
pub struct SqliteWorkQueue {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

impl SqliteWorkQueue {
    /// Opens (or creates) the queue database at `path`
    pub fn new(path: &Path, retry: RetryPolicy) -> Result<Self, ExportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            retry,
        })
    }

    /// Creates an in-memory queue
    pub fn open_in_memory(retry: RetryPolicy) -> Result<Self, ExportError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            retry,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Database("queue lock poisoned".to_string()))
    }
}

#[async_trait]
impl WorkQueue for SqliteWorkQueue {
    async fn enqueue(&self, item: &WorkItem) -> QueueResult<bool> {
        let payload = serde_json::to_string(item)?;
        let now = now_millis();
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO queue_items (job_id, payload, state, attempts, available_at, enqueued_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![item.job_id, payload, QueueState::Waiting.to_db_string(), now],
        )?;
        Ok(inserted > 0)
    }

    async fn dequeue(&self) -> QueueResult<Option<Delivery>> {
        let now = now_millis();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let next = tx
            .query_row(
                "SELECT job_id, payload, attempts FROM queue_items
                 WHERE state = ?1 AND available_at <= ?2
                 ORDER BY available_at, enqueued_at, rowid
                 LIMIT 1",
                params![QueueState::Waiting.to_db_string(), now],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((job_id, payload, attempts)) = next else {
            return Ok(None);
        };

        let item: WorkItem = serde_json::from_str(&payload)?;
        let attempt = attempts + 1;

        tx.execute(
            "UPDATE queue_items SET state = ?1, attempts = ?2, started_at = ?3 WHERE job_id = ?4",
            params![QueueState::Active.to_db_string(), attempt, now, job_id],
        )?;
        tx.commit()?;

        Ok(Some(Delivery { item, attempt }))
    }

    async fn complete(&self, job_id: &str, result_json: &str) -> QueueResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE queue_items SET state = ?1, finished_at = ?2, result = ?3, last_error = NULL
             WHERE job_id = ?4 AND state = ?5",
            params![
                QueueState::Completed.to_db_string(),
                now_millis(),
                result_json,
                job_id,
                QueueState::Active.to_db_string()
            ],
        )?;
        if updated == 0 {
            return Err(QueueError::NotActive {
                job_id: job_id.to_string(),
            });
        }
        Ok(())
    }

    async fn fail(&self, job_id: &str, error: &str) -> QueueResult<FailOutcome> {
        let now = now_millis();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let attempts: u32 = tx
            .query_row(
                "SELECT attempts FROM queue_items WHERE job_id = ?1 AND state = ?2",
                params![job_id, QueueState::Active.to_db_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| QueueError::NotActive {
                job_id: job_id.to_string(),
            })?;

        let outcome = if attempts >= self.retry.max_attempts {
            tx.execute(
                "UPDATE queue_items SET state = ?1, finished_at = ?2, last_error = ?3 WHERE job_id = ?4",
                params![QueueState::Dead.to_db_string(), now, error, job_id],
            )?;
            FailOutcome::Dead { attempts }
        } else {
            let delay = self.retry.delay_for(attempts);
            tx.execute(
                "UPDATE queue_items SET state = ?1, available_at = ?2, last_error = ?3 WHERE job_id = ?4",
                params![
                    QueueState::Waiting.to_db_string(),
                    now.saturating_add(millis(delay)),
                    error,
                    job_id
                ],
            )?;
            FailOutcome::Retrying {
                attempt: attempts,
                delay,
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    async fn recover_stalled(&self) -> QueueResult<usize> {
        let conn = self.lock()?;
        let recovered = conn.execute(
            "UPDATE queue_items SET state = ?1, available_at = ?2 WHERE state = ?3",
            params![
                QueueState::Waiting.to_db_string(),
                now_millis(),
                QueueState::Active.to_db_string()
            ],
        )?;
        Ok(recovered)
    }

    async fn purge_expired(&self, retention: &RetentionPolicy) -> QueueResult<usize> {
        let now = now_millis();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let completed = QueueState::Completed.to_db_string();

        let mut removed = tx.execute(
            "DELETE FROM queue_items WHERE state = ?1 AND finished_at < ?2",
            params![
                completed,
                now.saturating_sub(millis(retention.completed_max_age))
            ],
        )?;

        removed += tx.execute(
            "DELETE FROM queue_items WHERE state = ?1 AND job_id NOT IN (
                 SELECT job_id FROM queue_items WHERE state = ?1
                 ORDER BY finished_at DESC, rowid DESC LIMIT ?2
             )",
            params![completed, retention.completed_max_count],
        )?;

        removed += tx.execute(
            "DELETE FROM queue_items WHERE state = ?1 AND finished_at < ?2",
            params![
                QueueState::Dead.to_db_string(),
                now.saturating_sub(millis(retention.dead_max_age))
            ],
        )?;

        tx.commit()?;
        Ok(removed)
    }

    async fn retry_dead(&self, job_id: &str) -> QueueResult<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE queue_items SET state = ?1, attempts = 0, available_at = ?2, finished_at = NULL
             WHERE job_id = ?3 AND state = ?4",
            params![
                QueueState::Waiting.to_db_string(),
                now_millis(),
                job_id,
                QueueState::Dead.to_db_string()
            ],
        )?;
        Ok(updated > 0)
    }

    async fn retry_all_dead(&self) -> QueueResult<usize> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE queue_items SET state = ?1, attempts = 0, available_at = ?2, finished_at = NULL
             WHERE state = ?3",
            params![
                QueueState::Waiting.to_db_string(),
                now_millis(),
                QueueState::Dead.to_db_string()
            ],
        )?;
        Ok(updated)
    }

    async fn dead_items(&self, limit: usize) -> QueueResult<Vec<DeadItem>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT payload, attempts, last_error FROM queue_items
             WHERE state = ?1 ORDER BY finished_at DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(
                params![QueueState::Dead.to_db_string(), limit as i64],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(payload, attempts, last_error)| {
                Ok(DeadItem {
                    item: serde_json::from_str(&payload)?,
                    attempts,
                    last_error,
                })
            })
            .collect()
    }

    async fn counts(&self) -> QueueResult<QueueCounts> {
        let now = now_millis();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT state, available_at <= ?1 AS due, COUNT(*) FROM queue_items GROUP BY state, due",
        )?;
        let rows = stmt
            .query_map(params![now], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = QueueCounts::default();
        for (state, due, count) in rows {
            let count = count.max(0) as u64;
            match QueueState::from_db_string(&state) {
                Some(QueueState::Waiting) if due => counts.waiting += count,
                Some(QueueState::Waiting) => counts.delayed += count,
                Some(QueueState::Active) => counts.active += count,
                Some(QueueState::Completed) => counts.completed += count,
                Some(QueueState::Dead) => counts.dead += count,
                None => {}
            }
        }
        Ok(counts)
    }
}
