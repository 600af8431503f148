//! Job processor - runs the full pipeline for one work item
//!
//! crawl -> archive -> upload, with progress and logs reported to the job
//! store. The job record always ends `completed` or `failed`, except for a
//! redelivered item whose job already completed, which is acknowledged
//! without running again.

use crate::archive::build_archive;
use crate::config::Config;
use crate::crawler::{
    build_http_client, CrawlOrchestrator, CrawlReporter, HttpRendererFactory, RendererFactory,
};
use crate::persist::{
    storage_path, ObjectStore, UploadMode, UploadPolicy, Uploader, STALE_SESSION_AGE,
};
use crate::queue::WorkItem;
use crate::state::{JobStatus, LogLevel, ProgressPlan, ProgressTracker};
use crate::storage::{JobStore, JobUpdate};
use crate::ExportError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result summary handed back to the queue on success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub success: bool,
    pub pages_scraped: usize,
    pub total_images: usize,
    pub archive_size: u64,
    pub storage_path: String,
}

/// Routes one job's logs and progress to tracing and the job store
///
/// Store failures are traced and swallowed; they never fail the job.
pub struct JobReporter {
    job_id: String,
    store: Arc<dyn JobStore>,
    tracker: ProgressTracker,
}

impl JobReporter {
    pub fn new(job_id: impl Into<String>, store: Arc<dyn JobStore>) -> Self {
        Self {
            job_id: job_id.into(),
            store,
            tracker: ProgressTracker::new(),
        }
    }

    pub fn current_progress(&self) -> u8 {
        self.tracker.current()
    }
}

#[async_trait]
impl CrawlReporter for JobReporter {
    async fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => info!(job_id = %self.job_id, "{}", message),
            LogLevel::Warn => warn!(job_id = %self.job_id, "{}", message),
            LogLevel::Error => error!(job_id = %self.job_id, "{}", message),
        }

        if let Err(e) = self.store.append_log(&self.job_id, level, message).await {
            warn!(job_id = %self.job_id, "Failed to record job log: {}", e);
        }
    }

    async fn progress(&self, percent: u8) {
        let Some(percent) = self.tracker.advance(percent) else {
            return;
        };
        if let Err(e) = self
            .store
            .update_job(&self.job_id, JobUpdate::progress(percent))
            .await
        {
            warn!(job_id = %self.job_id, "Failed to record progress {}: {}", percent, e);
        }
    }
}

/// Executes the export pipeline for work items
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    orchestrator: CrawlOrchestrator,
    uploader: Uploader,
    plan: ProgressPlan,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        orchestrator: CrawlOrchestrator,
        uploader: Uploader,
    ) -> Self {
        Self {
            plan: orchestrator.progress_plan(),
            store,
            orchestrator,
            uploader,
        }
    }

    /// Processor using the HTTP renderer and a client built from `config`
    pub fn from_config(
        config: &Config,
        store: Arc<dyn JobStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Result<Self, ExportError> {
        let client = build_http_client(&config.user_agent, config.crawler.navigation_timeout())?;
        let renderers = Arc::new(HttpRendererFactory::new(client.clone()));
        Ok(Self::with_renderers(config, client, renderers, store, objects))
    }

    /// Processor with a caller-supplied rendering capability
    pub fn with_renderers(
        config: &Config,
        client: Client,
        renderers: Arc<dyn RendererFactory>,
        store: Arc<dyn JobStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let orchestrator = CrawlOrchestrator::new(config, client, renderers);
        let uploader = Uploader::new(objects, UploadPolicy::from(&config.storage));
        Self::new(store, orchestrator, uploader)
    }

    /// Runs the pipeline for `item`
    ///
    /// On failure the job record is marked failed with the error's message
    /// before the error is returned to the caller for retry accounting.
    pub async fn process(&self, item: &WorkItem) -> Result<JobSummary, ExportError> {
        if let Some(summary) = self.already_completed(&item.job_id).await? {
            return Ok(summary);
        }

        let reporter = JobReporter::new(item.job_id.clone(), Arc::clone(&self.store));

        match self.run(item, &reporter).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.record_failure(&item.job_id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Logs `message` against the job and marks its record failed
    pub async fn record_failure(&self, job_id: &str, message: &str) {
        let reporter = JobReporter::new(job_id, Arc::clone(&self.store));
        reporter
            .log(LogLevel::Error, &format!("Job failed: {}", message))
            .await;
        if let Err(store_err) = self
            .store
            .update_job(job_id, JobUpdate::failed(message))
            .await
        {
            warn!(job_id = %job_id, "Failed to mark job failed: {}", store_err);
        }
    }

    /// Discards chunked uploads left behind by crashed executions
    pub async fn purge_stale_uploads(&self) -> Result<usize, ExportError> {
        Ok(self.uploader.purge_stale_sessions(STALE_SESSION_AGE).await?)
    }

    async fn already_completed(&self, job_id: &str) -> Result<Option<JobSummary>, ExportError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(None);
        };
        if job.status != JobStatus::Completed {
            return Ok(None);
        }

        info!(job_id = %job_id, "Job already completed, acknowledging redelivery");
        Ok(Some(JobSummary {
            success: true,
            pages_scraped: 0,
            total_images: 0,
            archive_size: 0,
            storage_path: job.storage_path.unwrap_or_default(),
        }))
    }

    async fn run(&self, item: &WorkItem, reporter: &JobReporter) -> Result<JobSummary, ExportError> {
        self.store
            .update_job(&item.job_id, JobUpdate::processing())
            .await?;
        reporter
            .log(
                LogLevel::Info,
                &format!("Starting scrape of {}", item.target_url),
            )
            .await;

        let result = self.orchestrator.scrape(&item.target_url, reporter).await?;

        reporter.progress(self.plan.crawl_finished()).await;
        reporter
            .log(LogLevel::Info, "Scraping complete. Creating ZIP archive...")
            .await;

        let pages_scraped = result.pages.len();
        let total_images = result.total_images;
        let payload = tokio::task::spawn_blocking(move || build_archive(&result))
            .await
            .map_err(|e| ExportError::Task(e.to_string()))??;

        reporter.progress(self.plan.archive_built()).await;
        reporter
            .log(
                LogLevel::Info,
                &format!(
                    "Uploading ZIP ({:.2} MB) to storage...",
                    payload.total_size as f64 / (1024.0 * 1024.0)
                ),
            )
            .await;

        let path = storage_path(&item.job_id, &payload.filename);
        let mode = self.uploader.upload(&path, &payload).await?;
        match mode {
            UploadMode::Direct => debug!(job_id = %item.job_id, "Uploaded {} directly", path),
            UploadMode::Chunked { chunks_sent } => {
                debug!(job_id = %item.job_id, "Uploaded {} in {} chunks", path, chunks_sent)
            }
        }

        self.store
            .update_job(&item.job_id, JobUpdate::completed(path.clone()))
            .await?;
        reporter
            .log(LogLevel::Info, "Job completed successfully!")
            .await;

        Ok(JobSummary {
            success: true,
            pages_scraped,
            total_images,
            archive_size: payload.total_size,
            storage_path: path,
        })
    }
}
