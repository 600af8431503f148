//! Producer side of the queue: job submission and requeueing

use crate::queue::{WorkItem, WorkQueue};
use crate::storage::{JobRecord, JobStore};
use crate::url::normalize_submitted_url;
use crate::ExportError;
use tracing::{debug, info};
use uuid::Uuid;

/// Creates a pending job for `url` and enqueues its work item
///
/// The URL is trimmed and given an `https://` scheme when it has none.
pub async fn submit_job(
    store: &dyn JobStore,
    queue: &dyn WorkQueue,
    url: &str,
    submitter_id: &str,
) -> Result<JobRecord, ExportError> {
    let target = normalize_submitted_url(url)?;
    let job_id = Uuid::new_v4().to_string();

    let job = store
        .create_job(&job_id, submitter_id, target.as_str())
        .await?;
    queue.enqueue(&work_item(&job)).await?;

    info!(job_id = %job.id, "Submitted {}", job.target_url);
    Ok(job)
}

/// Re-enqueues every job that is still pending and never started
///
/// Items already in the queue are left alone. Returns how many were added.
pub async fn requeue_pending(
    store: &dyn JobStore,
    queue: &dyn WorkQueue,
) -> Result<usize, ExportError> {
    let mut added = 0;
    for job in store.list_unstarted_jobs().await? {
        if queue.enqueue(&work_item(&job)).await? {
            added += 1;
        } else {
            debug!(job_id = %job.id, "Already queued");
        }
    }
    Ok(added)
}

fn work_item(job: &JobRecord) -> WorkItem {
    WorkItem {
        job_id: job.id.clone(),
        target_url: job.target_url.clone(),
        submitter_id: job.submitter_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{RetryPolicy, SqliteWorkQueue};
    use crate::state::JobStatus;
    use crate::storage::SqliteJobStore;

    fn fixtures() -> (SqliteJobStore, SqliteWorkQueue) {
        (
            SqliteJobStore::open_in_memory().unwrap(),
            SqliteWorkQueue::open_in_memory(RetryPolicy::default()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_submit_normalizes_and_enqueues() {
        let (store, queue) = fixtures();
        let job = submit_job(&store, &queue, "  example.test  ", "user-1")
            .await
            .unwrap();

        assert_eq!(job.target_url, "https://example.test/");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.id.len(), 36);

        let delivery = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(delivery.item.job_id, job.id);
        assert_eq!(delivery.item.submitter_id, "user-1");
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_url() {
        let (store, queue) = fixtures();
        assert!(submit_job(&store, &queue, "   ", "user-1").await.is_err());
        assert_eq!(queue.counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_requeue_pending_is_idempotent() {
        let (store, queue) = fixtures();
        store
            .create_job("stuck", "user-1", "https://example.test/")
            .await
            .unwrap();

        assert_eq!(requeue_pending(&store, &queue).await.unwrap(), 1);
        assert_eq!(requeue_pending(&store, &queue).await.unwrap(), 0);
        assert_eq!(queue.counts().await.unwrap().waiting, 1);
    }
}
