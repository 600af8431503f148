//! Durable work queue for export jobs
//!
//! Work items are keyed by job id: enqueueing an id that is already known
//! is a no-op. Failed deliveries are retried with exponential backoff and
//! moved to a dead-letter state once attempts are exhausted. Finished items
//! are kept for a bounded time so operators can inspect them.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteWorkQueue;
pub use traits::{QueueError, QueueResult, WorkQueue};

use crate::config::QueueConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Payload of a queued export job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub job_id: String,
    pub target_url: String,
    pub submitter_id: String,
}

/// A work item handed to a worker, with its 1-based attempt number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub item: WorkItem,
    pub attempt: u32,
}

/// State of an item inside the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Ready for delivery once `available_at` has passed
    Waiting,
    /// Claimed by a worker
    Active,
    Completed,
    /// Attempts exhausted
    Dead,
}

impl QueueState {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            QueueState::Waiting => "waiting",
            QueueState::Active => "active",
            QueueState::Completed => "completed",
            QueueState::Dead => "dead",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(QueueState::Waiting),
            "active" => Some(QueueState::Active),
            "completed" => Some(QueueState::Completed),
            "dead" => Some(QueueState::Dead),
            _ => None,
        }
    }
}

/// What happened to an item after a failed delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOutcome {
    /// Rescheduled; `delay` until the next attempt
    Retrying { attempt: u32, delay: Duration },
    /// Moved to the dead-letter state
    Dead { attempts: u32 },
}

/// A dead-lettered item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadItem {
    pub item: WorkItem,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Item counts per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    /// Waiting and already due
    pub waiting: u64,
    /// Waiting for a backoff to elapse
    pub delayed: u64,
    pub active: u64,
    pub completed: u64,
    pub dead: u64,
}

impl QueueCounts {
    pub fn total(&self) -> u64 {
        self.waiting + self.delayed + self.active + self.completed + self.dead
    }
}

/// Attempt budget and exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt `attempt` (1-based):
    /// `base * 2^(attempt - 1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(5000),
        }
    }
}

/// How long finished items are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub completed_max_age: Duration,
    pub completed_max_count: u32,
    pub dead_max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed_max_age: Duration::from_secs(24 * 3600),
            completed_max_count: 100,
            dead_max_age: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

impl From<&QueueConfig> for RetryPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }
}

impl From<&QueueConfig> for RetentionPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            completed_max_age: Duration::from_secs(config.completed_retention_secs),
            completed_max_count: config.completed_retention_count,
            dead_max_age: Duration::from_secs(config.failed_retention_secs),
        }
    }
}
