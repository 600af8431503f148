//! Helpers shared by the integration test targets

#![allow(dead_code)]

use async_trait::async_trait;
use site_export::config::{parse_config, Config};
use site_export::crawler::{NavigateOptions, RenderError, RenderedPage, Renderer, RendererFactory};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Knobs that differ between test scenarios
pub struct TestSettings {
    pub concurrency: u32,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub navigation_timeout_ms: u64,
    pub direct_upload_limit: u64,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_attempts: 3,
            backoff_base_ms: 10,
            navigation_timeout_ms: 5_000,
            direct_upload_limit: 50 * 1024 * 1024,
        }
    }
}

/// A fast configuration whose databases and objects live under `dir`
pub fn test_config(dir: &Path, settings: &TestSettings) -> Config {
    let dir = dir.display();
    let text = format!(
        r#"
[worker]
concurrency = {concurrency}
rate-limit-max = 100
rate-limit-window-ms = 1000
poll-interval-ms = 10

[queue]
database-path = "{dir}/queue.db"
max-attempts = {max_attempts}
backoff-base-ms = {backoff}

[crawler]
page-delay-ms = 0
navigation-timeout-ms = {nav}
network-idle-ms = 0
scroll-interval-ms = 1
scroll-timeout-ms = 100
settle-ms = 0

[user-agent]
crawler-name = "SiteExportTest"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[storage]
root-dir = "{dir}/objects"
direct-upload-limit = {direct}
chunk-size = 1024
chunk-retry-delays-ms = [0, 10]

[database]
path = "{dir}/jobs.db"
"#,
        concurrency = settings.concurrency,
        max_attempts = settings.max_attempts,
        backoff = settings.backoff_base_ms,
        nav = settings.navigation_timeout_ms,
        direct = settings.direct_upload_limit,
    );
    parse_config(&text).expect("test config is valid")
}

/// Polls `check` until it returns true or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check().await
}

/// Renders the same document for every URL after `latency`, and tracks
/// how many renderers are alive at once
pub struct FixedFactory {
    pub html: String,
    pub latency: Duration,
    pub launched: Arc<AtomicUsize>,
    pub alive: Arc<AtomicUsize>,
    pub peak_alive: Arc<AtomicUsize>,
}

impl FixedFactory {
    pub fn new(html: &str, latency: Duration) -> Self {
        Self {
            html: html.to_string(),
            latency,
            launched: Arc::new(AtomicUsize::new(0)),
            alive: Arc::new(AtomicUsize::new(0)),
            peak_alive: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl RendererFactory for FixedFactory {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        let now = self.alive.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_alive.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(FixedRenderer {
            html: self.html.clone(),
            latency: self.latency,
            alive: Arc::clone(&self.alive),
        }))
    }
}

struct FixedRenderer {
    html: String,
    latency: Duration,
    alive: Arc<AtomicUsize>,
}

#[async_trait]
impl Renderer for FixedRenderer {
    async fn open(
        &self,
        _url: &Url,
        _options: NavigateOptions,
    ) -> Result<Box<dyn RenderedPage>, RenderError> {
        tokio::time::sleep(self.latency).await;
        Ok(Box::new(FixedPage(self.html.clone())))
    }

    async fn close(&self) {
        self.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

struct FixedPage(String);

#[async_trait]
impl RenderedPage for FixedPage {
    async fn scroll_through(&mut self, _: u32, _: Duration) -> Result<(), RenderError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        Ok(self.0.clone())
    }

    async fn close(self: Box<Self>) {}
}

/// A rendering capability that never starts
pub struct BrokenFactory;

#[async_trait]
impl RendererFactory for BrokenFactory {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError> {
        Err(RenderError::Launch("no display available".to_string()))
    }
}

/// A rendering capability whose launch panics
pub struct PanickingFactory;

#[async_trait]
impl RendererFactory for PanickingFactory {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError> {
        panic!("renderer crashed");
    }
}
