//! Integration tests for the export pipeline
//!
//! These tests run one work item through crawl, archive and upload against a
//! wiremock site, and inspect the job record, its logs and the stored zip.

mod common;

use common::{test_config, BrokenFactory, TestSettings};
use site_export::dispatcher::JobProcessor;
use site_export::persist::LocalObjectStore;
use site_export::queue::WorkItem;
use site_export::state::{JobStatus, LogLevel};
use site_export::storage::{JobStore, SqliteJobStore};
use site_export::ExportError;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::ZipArchive;

const PNG: &[u8] = &[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

struct Harness {
    _dir: TempDir,
    store: Arc<SqliteJobStore>,
    objects: Arc<LocalObjectStore>,
    processor: JobProcessor,
}

async fn harness(settings: TestSettings) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &settings);
    let store = Arc::new(SqliteJobStore::new(Path::new(&config.database.path)).unwrap());
    let objects = Arc::new(LocalObjectStore::new(
        &config.storage.root_dir,
        &config.storage.bucket,
    ));
    let processor = JobProcessor::from_config(&config, store.clone(), objects.clone()).unwrap();
    Harness {
        _dir: dir,
        store,
        objects,
        processor,
    }
}

async fn submit(store: &SqliteJobStore, job_id: &str, target: &str) -> WorkItem {
    store.create_job(job_id, "tester", target).await.unwrap();
    WorkItem {
        job_id: job_id.to_string(),
        target_url: target.to_string(),
        submitter_id: "tester".to_string(),
    }
}

fn open_archive(objects: &LocalObjectStore, storage_path: &str) -> ZipArchive<Cursor<Vec<u8>>> {
    let bytes = std::fs::read(objects.object_path(storage_path).unwrap()).unwrap();
    ZipArchive::new(Cursor::new(bytes)).unwrap()
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut entry = archive.by_name(name).unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

async fn mount_site(server: &MockServer) {
    let base = server.uri();
    let sitemap = format!(
        "<?xml version=\"1.0\"?><urlset><url><loc>{0}/</loc></url><url><loc>{0}/about</loc></url></urlset>",
        base
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Home</title></head><body>\
             <nav>menu</nav>\
             <main><h1>Welcome</h1><p>Hello <strong>world</strong></p>\
             <img src=\"/logo.png\" alt=\"Logo\"><img src=\"/missing.png\" alt=\"Gone\">\
             </main></body></html>",
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>About</title></head><body>\
             <article><ul><li>One</li><li>Two</li></ul></article></body></html>",
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_export_site_end_to_end() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let h = harness(TestSettings::default()).await;
    let item = submit(&h.store, "job-e2e", &server.uri()).await;

    let summary = h.processor.process(&item).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.pages_scraped, 2);
    assert_eq!(summary.total_images, 1);
    assert!(summary.storage_path.starts_with("job-e2e/export-"));
    assert!(summary.storage_path.ends_with(".zip"));

    let job = h.store.get_job("job-e2e").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.storage_path.as_deref(), Some(summary.storage_path.as_str()));
    assert_eq!(job.error_message, None);

    let mut archive = open_archive(&h.objects, &summary.storage_path);
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    assert!(names.contains(&"manifest.json".to_string()));
    assert!(names.contains(&"pages/home.md".to_string()));
    assert!(names.contains(&"pages/about.md".to_string()));
    assert!(names.contains(&"images/home/logo.png".to_string()));
    assert_eq!(
        names.iter().filter(|n| n.starts_with("images/")).count(),
        1
    );

    let home = read_entry(&mut archive, "pages/home.md");
    assert!(home.starts_with(&format!(
        "# Home\n\n> Source: {}/\n\n---\n\n",
        server.uri()
    )));
    assert!(home.contains("# Welcome"));
    assert!(home.contains("**world**"));
    assert!(home.contains("![Logo]("));
    assert!(!home.contains("menu"));

    let about = read_entry(&mut archive, "pages/about.md");
    let bullets: Vec<&str> = about
        .lines()
        .filter_map(|line| line.strip_prefix("- "))
        .map(str::trim)
        .collect();
    assert_eq!(bullets, vec!["One", "Two"]);

    let manifest: serde_json::Value =
        serde_json::from_str(&read_entry(&mut archive, "manifest.json")).unwrap();
    assert_eq!(manifest["sourceUrl"], server.uri());
    assert_eq!(manifest["totalPages"], 2);
    assert_eq!(manifest["totalImages"], 1);
    assert_eq!(manifest["pages"][0]["slug"], "home");
    assert_eq!(manifest["pages"][0]["imageCount"], 1);
    assert_eq!(manifest["pages"][1]["slug"], "about");

    let logs = h.store.get_logs("job-e2e").await.unwrap();
    let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(
        messages.first().copied(),
        Some(format!("Starting scrape of {}", server.uri()).as_str())
    );
    assert!(messages.contains(&"Found 2 pages in sitemap"));
    assert!(logs
        .iter()
        .any(|l| l.level == LogLevel::Warn && l.message.contains("/missing.png")));
    assert_eq!(messages.last().copied(), Some("Job completed successfully!"));
}

#[tokio::test]
async fn test_chunked_upload_for_large_archives() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let h = harness(TestSettings {
        direct_upload_limit: 1,
        ..TestSettings::default()
    })
    .await;
    let item = submit(&h.store, "job-chunked", &server.uri()).await;

    let summary = h.processor.process(&item).await.unwrap();
    let mut archive = open_archive(&h.objects, &summary.storage_path);
    assert!(archive.by_name("pages/about.md").is_ok());
    assert_eq!(
        std::fs::metadata(h.objects.object_path(&summary.storage_path).unwrap())
            .unwrap()
            .len(),
        summary.archive_size
    );
}

#[tokio::test]
async fn test_navigation_timeout_yields_empty_archive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<title>Slow</title>")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let h = harness(TestSettings {
        navigation_timeout_ms: 200,
        ..TestSettings::default()
    })
    .await;
    let item = submit(&h.store, "job-slow", &server.uri()).await;

    let summary = h.processor.process(&item).await.unwrap();
    assert_eq!(summary.pages_scraped, 0);

    let job = h.store.get_job("job-slow").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);

    let mut archive = open_archive(&h.objects, &summary.storage_path);
    assert!(archive.file_names().any(|n| n == "pages/"));
    assert!(!archive.file_names().any(|n| n.ends_with(".md")));
    let manifest: serde_json::Value =
        serde_json::from_str(&read_entry(&mut archive, "manifest.json")).unwrap();
    assert_eq!(manifest["totalPages"], 0);

    let logs = h.store.get_logs("job-slow").await.unwrap();
    assert!(logs
        .iter()
        .any(|l| l.message.starts_with("No sitemap found")));
    assert!(logs
        .iter()
        .any(|l| l.level == LogLevel::Error && l.message.starts_with("Failed to scrape")));
}

#[tokio::test]
async fn test_malformed_target_fails_job() {
    let h = harness(TestSettings::default()).await;
    let item = submit(&h.store, "job-bad", "not a url").await;

    let err = h.processor.process(&item).await.unwrap_err();
    assert!(matches!(err, ExportError::InvalidTarget { .. }));

    let job = h.store.get_job("job-bad").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.storage_path, None);
    assert_eq!(job.error_message, Some(err.to_string()));

    let logs = h.store.get_logs("job-bad").await.unwrap();
    let last = logs.last().unwrap();
    assert_eq!(last.level, LogLevel::Error);
    assert!(last.message.starts_with("Job failed: "));
}

#[tokio::test]
async fn test_renderer_launch_failure_fails_job() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &TestSettings::default());
    let store = Arc::new(SqliteJobStore::new(Path::new(&config.database.path)).unwrap());
    let objects = Arc::new(LocalObjectStore::new(
        &config.storage.root_dir,
        &config.storage.bucket,
    ));
    let processor = JobProcessor::with_renderers(
        &config,
        reqwest::Client::new(),
        Arc::new(BrokenFactory),
        store.clone(),
        objects,
    );
    let item = submit(&store, "job-norender", "https://example.test").await;

    let err = processor.process(&item).await.unwrap_err();
    assert!(err.to_string().contains("no display available"));

    let job = store.get_job("job-norender").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 0);
    assert!(job.storage_path.is_none());
}
