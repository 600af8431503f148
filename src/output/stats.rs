//! Queue and job statistics
//!
//! Gathers counts from the work queue and the job store and prints them for
//! the `status` command.

use crate::queue::{DeadItem, QueueCounts, WorkQueue};
use crate::state::JobStatus;
use crate::storage::JobStore;
use crate::ExportError;
use std::collections::HashMap;

/// How many recent jobs are sampled for the status breakdown
const JOB_SAMPLE: usize = 500;

/// How many dead-lettered items are listed
const DEAD_SAMPLE: usize = 10;

/// Snapshot of queue and job state
#[derive(Debug, Clone)]
pub struct ExportStatistics {
    pub queue: QueueCounts,

    /// Recent jobs by status
    pub jobs_by_status: HashMap<JobStatus, u64>,

    /// Number of jobs the breakdown was computed from
    pub jobs_sampled: u64,

    /// Most recent dead-lettered items
    pub dead_items: Vec<DeadItem>,
}

impl ExportStatistics {
    pub fn jobs_with_status(&self, status: JobStatus) -> u64 {
        self.jobs_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from the queue and job store
pub async fn load_statistics(
    queue: &dyn WorkQueue,
    store: &dyn JobStore,
) -> Result<ExportStatistics, ExportError> {
    let counts = queue.counts().await?;
    let dead_items = queue.dead_items(DEAD_SAMPLE).await?;

    let jobs = store.list_jobs(JOB_SAMPLE).await?;
    let mut jobs_by_status = HashMap::new();
    for job in &jobs {
        *jobs_by_status.entry(job.status).or_insert(0) += 1;
    }

    Ok(ExportStatistics {
        queue: counts,
        jobs_by_status,
        jobs_sampled: jobs.len() as u64,
        dead_items,
    })
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &ExportStatistics) {
    println!("=== Queue ===\n");
    println!("  Waiting:   {}", stats.queue.waiting);
    println!("  Delayed:   {}", stats.queue.delayed);
    println!("  Active:    {}", stats.queue.active);
    println!("  Completed: {}", stats.queue.completed);
    println!("  Failed:    {}", stats.queue.dead);
    println!("  Total:     {}", stats.queue.total());
    println!();

    println!("=== Jobs (latest {}) ===\n", stats.jobs_sampled);
    for status in [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ] {
        println!("  {:<11} {}", format!("{}:", status), stats.jobs_with_status(status));
    }
    println!();

    if !stats.dead_items.is_empty() {
        println!("Dead-lettered ({}):", stats.dead_items.len());
        for dead in &stats.dead_items {
            println!(
                "  - {} {} after {} attempts: {}",
                dead.item.job_id,
                dead.item.target_url,
                dead.attempts,
                dead.last_error.as_deref().unwrap_or("unknown error")
            );
        }
        println!();
    }

    let finished = stats.jobs_with_status(JobStatus::Completed)
        + stats.jobs_with_status(JobStatus::Failed);
    let success_rate = if finished > 0 {
        (stats.jobs_with_status(JobStatus::Completed) as f64 / finished as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} finished jobs completed)",
        success_rate,
        stats.jobs_with_status(JobStatus::Completed),
        finished
    );
}
