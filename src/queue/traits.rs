//! Work queue trait and error types

use crate::queue::{DeadItem, Delivery, FailOutcome, QueueCounts, RetentionPolicy, WorkItem};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(String),

    #[error("Queue item not found: {0}")]
    NotFound(String),

    #[error("Queue item {job_id} is not active")]
    NotActive { job_id: String },

    #[error("Invalid queue payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Durable, deduplicating work queue
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Adds an item unless its job id is already queued
    ///
    /// Returns `true` if the item was newly added.
    async fn enqueue(&self, item: &WorkItem) -> QueueResult<bool>;

    /// Claims the next due item, if any
    async fn dequeue(&self) -> QueueResult<Option<Delivery>>;

    /// Acknowledges a successful delivery and records its result
    async fn complete(&self, job_id: &str, result_json: &str) -> QueueResult<()>;

    /// Records a failed delivery; reschedules or dead-letters the item
    async fn fail(&self, job_id: &str, error: &str) -> QueueResult<FailOutcome>;

    /// Returns items left `active` by a previous process to `waiting`
    async fn recover_stalled(&self) -> QueueResult<usize>;

    /// Drops finished items past their retention; returns how many were removed
    async fn purge_expired(&self, retention: &RetentionPolicy) -> QueueResult<usize>;

    /// Moves one dead item back to `waiting` with a fresh attempt budget
    async fn retry_dead(&self, job_id: &str) -> QueueResult<bool>;

    /// Moves every dead item back to `waiting`
    async fn retry_all_dead(&self) -> QueueResult<usize>;

    async fn dead_items(&self, limit: usize) -> QueueResult<Vec<DeadItem>>;

    async fn counts(&self) -> QueueResult<QueueCounts>;
}
