//! Database schema for the work queue

/// SQL schema for the work queue
///
/// Timestamps are unix milliseconds so due-ness is a plain integer compare.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS queue_items (
    job_id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    state TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    available_at INTEGER NOT NULL,
    enqueued_at INTEGER NOT NULL,
    started_at INTEGER,
    finished_at INTEGER,
    last_error TEXT,
    result TEXT
);

CREATE INDEX IF NOT EXISTS idx_queue_due ON queue_items(state, available_at);
CREATE INDEX IF NOT EXISTS idx_queue_finished ON queue_items(state, finished_at);
"#;

/// Initializes the queue schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
