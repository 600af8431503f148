//! Integration tests for the dispatcher
//!
//! These tests run the worker pool against real SQLite queue and job stores
//! with a fake rendering capability, and check admission, retry and shutdown
//! behavior end-to-end.

mod common;

use common::{
    test_config, wait_until, BrokenFactory, FixedFactory, PanickingFactory, TestSettings,
};
use site_export::config::Config;
use site_export::crawler::RendererFactory;
use site_export::dispatcher::{requeue_pending, submit_job, Dispatcher, JobProcessor, JobSummary};
use site_export::persist::LocalObjectStore;
use site_export::queue::{RetryPolicy, SqliteWorkQueue, WorkItem, WorkQueue};
use site_export::state::JobStatus;
use site_export::storage::{JobStore, JobUpdate, SqliteJobStore};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

const PAGE: &str = "<html><head><title>Page</title></head><body><main><p>Body</p></main></body></html>";

struct Fixture {
    _dir: TempDir,
    config: Config,
    store: Arc<SqliteJobStore>,
    queue: Arc<SqliteWorkQueue>,
}

impl Fixture {
    fn new(settings: TestSettings) -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), &settings);
        let store = Arc::new(SqliteJobStore::new(Path::new(&config.database.path)).unwrap());
        let queue = Arc::new(
            SqliteWorkQueue::new(
                Path::new(&config.queue.database_path),
                RetryPolicy::from(&config.queue),
            )
            .unwrap(),
        );
        Self {
            _dir: dir,
            config,
            store,
            queue,
        }
    }

    fn processor(&self, renderers: Arc<dyn RendererFactory>) -> Arc<JobProcessor> {
        let objects = Arc::new(LocalObjectStore::new(
            &self.config.storage.root_dir,
            &self.config.storage.bucket,
        ));
        Arc::new(JobProcessor::with_renderers(
            &self.config,
            reqwest::Client::new(),
            renderers,
            self.store.clone(),
            objects,
        ))
    }

    fn dispatcher(&self, renderers: Arc<dyn RendererFactory>) -> Dispatcher {
        Dispatcher::new(&self.config, self.queue.clone(), self.processor(renderers))
    }

    async fn submit(&self, url: &str) -> String {
        submit_job(self.store.as_ref(), self.queue.as_ref(), url, "tester")
            .await
            .unwrap()
            .id
    }

    async fn all_jobs_have(&self, ids: &[String], status: JobStatus) -> bool {
        for id in ids {
            match self.store.get_job(id).await.unwrap() {
                Some(job) if job.status == status => {}
                _ => return false,
            }
        }
        true
    }
}

#[tokio::test]
async fn test_dispatcher_completes_submitted_jobs() {
    let site = MockServer::start().await;
    let fixture = Fixture::new(TestSettings::default());
    let factory = Arc::new(FixedFactory::new(PAGE, Duration::ZERO));

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(fixture.submit(&site.uri()).await);
    }

    let mut dispatcher = fixture.dispatcher(factory.clone());
    dispatcher.start().await.unwrap();
    assert!(dispatcher.is_running());

    let done = wait_until(Duration::from_secs(10), || {
        fixture.all_jobs_have(&ids, JobStatus::Completed)
    })
    .await;
    dispatcher.stop().await;
    assert!(done, "jobs did not complete in time");
    assert!(!dispatcher.is_running());

    let counts = fixture.queue.counts().await.unwrap();
    assert_eq!(counts.completed, 3);
    assert_eq!(counts.waiting + counts.active + counts.dead, 0);

    for id in &ids {
        let job = fixture.store.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.progress, 100);
        let path = job.storage_path.unwrap();
        assert!(path.starts_with(&format!("{}/", id)));
    }
    assert_eq!(factory.launched.load(Ordering::SeqCst), 3);
    assert_eq!(factory.alive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let site = MockServer::start().await;
    let fixture = Fixture::new(TestSettings {
        concurrency: 2,
        ..TestSettings::default()
    });
    let factory = Arc::new(FixedFactory::new(PAGE, Duration::from_millis(150)));

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(fixture.submit(&site.uri()).await);
    }

    let mut dispatcher = fixture.dispatcher(factory.clone());
    dispatcher.start().await.unwrap();
    let done = wait_until(Duration::from_secs(15), || {
        fixture.all_jobs_have(&ids, JobStatus::Completed)
    })
    .await;
    dispatcher.stop().await;

    assert!(done, "jobs did not complete in time");
    assert_eq!(factory.peak_alive.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failing_job_is_retried_then_dead_lettered() {
    let fixture = Fixture::new(TestSettings {
        max_attempts: 2,
        backoff_base_ms: 10,
        ..TestSettings::default()
    });
    let id = fixture.submit("https://example.test").await;

    let mut dispatcher = fixture.dispatcher(Arc::new(BrokenFactory));
    dispatcher.start().await.unwrap();
    let dead = wait_until(Duration::from_secs(10), || async {
        fixture.queue.counts().await.unwrap().dead == 1
    })
    .await;
    dispatcher.stop().await;
    assert!(dead, "item was not dead-lettered");

    let dead_items = fixture.queue.dead_items(10).await.unwrap();
    assert_eq!(dead_items.len(), 1);
    assert_eq!(dead_items[0].item.job_id, id);
    assert_eq!(dead_items[0].attempts, 2);
    assert!(dead_items[0]
        .last_error
        .as_deref()
        .unwrap()
        .contains("no display available"));

    let job = fixture.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("no display available"));

    // Operator re-submission puts it back with a fresh attempt budget
    assert_eq!(fixture.queue.retry_all_dead().await.unwrap(), 1);
    let counts = fixture.queue.counts().await.unwrap();
    assert_eq!(counts.dead, 0);
    assert_eq!(counts.waiting, 1);
}

#[tokio::test]
async fn test_panicking_execution_is_reported_to_queue() {
    let fixture = Fixture::new(TestSettings {
        max_attempts: 1,
        ..TestSettings::default()
    });
    let id = fixture.submit("https://example.test").await;

    let mut dispatcher = fixture.dispatcher(Arc::new(PanickingFactory));
    dispatcher.start().await.unwrap();
    let dead = wait_until(Duration::from_secs(10), || async {
        fixture.queue.counts().await.unwrap().dead == 1
    })
    .await;
    dispatcher.stop().await;
    assert!(dead, "panicked item was left active");

    let counts = fixture.queue.counts().await.unwrap();
    assert_eq!(counts.active, 0);
    let dead_items = fixture.queue.dead_items(10).await.unwrap();
    assert!(dead_items[0]
        .last_error
        .as_deref()
        .unwrap()
        .contains("panicked"));

    let job = fixture.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains("panicked"));
}

#[tokio::test]
async fn test_completed_job_is_not_processed_twice() {
    let fixture = Fixture::new(TestSettings::default());
    fixture
        .store
        .create_job("done", "tester", "https://example.test/")
        .await
        .unwrap();
    fixture
        .store
        .update_job("done", JobUpdate::processing())
        .await
        .unwrap();
    fixture
        .store
        .update_job("done", JobUpdate::completed("done/export.zip"))
        .await
        .unwrap();
    fixture
        .queue
        .enqueue(&WorkItem {
            job_id: "done".to_string(),
            target_url: "https://example.test/".to_string(),
            submitter_id: "tester".to_string(),
        })
        .await
        .unwrap();

    let factory = Arc::new(FixedFactory::new(PAGE, Duration::ZERO));
    let mut dispatcher = fixture.dispatcher(factory.clone());
    dispatcher.start().await.unwrap();
    let acked = wait_until(Duration::from_secs(5), || async {
        fixture.queue.counts().await.unwrap().completed == 1
    })
    .await;
    dispatcher.stop().await;

    assert!(acked);
    assert_eq!(factory.launched.load(Ordering::SeqCst), 0);
    let job = fixture.store.get_job("done").await.unwrap().unwrap();
    assert_eq!(job.storage_path.as_deref(), Some("done/export.zip"));
}

#[tokio::test]
async fn test_stop_drains_in_flight_jobs() {
    let site = MockServer::start().await;
    let fixture = Fixture::new(TestSettings::default());
    let factory = Arc::new(FixedFactory::new(PAGE, Duration::from_millis(500)));
    let id = fixture.submit(&site.uri()).await;

    let mut dispatcher = fixture.dispatcher(factory.clone());
    dispatcher.start().await.unwrap();
    let started = wait_until(Duration::from_secs(5), || async {
        factory.launched.load(Ordering::SeqCst) == 1
    })
    .await;
    assert!(started);

    dispatcher.stop().await;

    let job = fixture.store.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(fixture.queue.counts().await.unwrap().completed, 1);
}

#[tokio::test]
async fn test_stalled_items_are_recovered_on_start() {
    let site = MockServer::start().await;
    let fixture = Fixture::new(TestSettings::default());
    let id = fixture.submit(&site.uri()).await;

    // A previous worker claimed the item and died
    let claimed = fixture.queue.dequeue().await.unwrap().unwrap();
    assert_eq!(claimed.item.job_id, id);
    assert_eq!(fixture.queue.counts().await.unwrap().active, 1);

    let mut dispatcher = fixture.dispatcher(Arc::new(FixedFactory::new(PAGE, Duration::ZERO)));
    dispatcher.start().await.unwrap();
    let done = wait_until(Duration::from_secs(10), || {
        fixture.all_jobs_have(std::slice::from_ref(&id), JobStatus::Completed)
    })
    .await;
    dispatcher.stop().await;
    assert!(done);
}

#[tokio::test]
async fn test_requeue_pending_does_not_duplicate() {
    let fixture = Fixture::new(TestSettings::default());
    fixture.submit("https://example.test").await;
    fixture
        .store
        .create_job("orphan", "tester", "https://example.test/")
        .await
        .unwrap();

    assert_eq!(
        requeue_pending(fixture.store.as_ref(), fixture.queue.as_ref())
            .await
            .unwrap(),
        1
    );
    assert_eq!(fixture.queue.counts().await.unwrap().waiting, 2);
}

#[tokio::test]
async fn test_result_summary_is_stored_with_completion() {
    let site = MockServer::start().await;
    let fixture = Fixture::new(TestSettings::default());
    let id = fixture.submit(&site.uri()).await;

    let processor = fixture.processor(Arc::new(FixedFactory::new(PAGE, Duration::ZERO)));
    let delivery = fixture.queue.dequeue().await.unwrap().unwrap();
    let summary = processor.process(&delivery.item).await.unwrap();
    let json = serde_json::to_string(&summary).unwrap();
    fixture.queue.complete(&id, &json).await.unwrap();

    let parsed: JobSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.pages_scraped, 1);
    assert!(parsed.archive_size > 0);
    assert_eq!(fixture.queue.counts().await.unwrap().completed, 1);
}
