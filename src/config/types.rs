use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Site-Export
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,
    pub queue: QueueConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
}

/// Worker pool sizing and admission throughput
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WorkerConfig {
    /// Maximum number of jobs executing at the same time
    pub concurrency: u32,

    /// Maximum number of jobs admitted per rate-limit window
    pub rate_limit_max: u32,

    /// Length of the admission window (milliseconds)
    pub rate_limit_window_ms: u64,

    /// How long an idle worker waits before polling the queue again (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            rate_limit_max: 15,
            rate_limit_window_ms: 60_000,
            poll_interval_ms: 1_000,
        }
    }
}

impl WorkerConfig {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Durable queue location, retry policy and retention
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueueConfig {
    /// Path to the SQLite database backing the queue
    pub database_path: String,

    /// Attempts before an item is dead-lettered
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles on every further attempt (milliseconds)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// How long completed items are kept (seconds)
    #[serde(default = "default_completed_retention_secs")]
    pub completed_retention_secs: u64,

    /// How many completed items are kept at most
    #[serde(default = "default_completed_retention_count")]
    pub completed_retention_count: u32,

    /// How long dead-lettered items are kept (seconds)
    #[serde(default = "default_failed_retention_secs")]
    pub failed_retention_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    5_000
}

fn default_completed_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_completed_retention_count() -> u32 {
    100
}

fn default_failed_retention_secs() -> u64 {
    7 * 24 * 60 * 60
}

/// Crawl pacing, rendering timeouts and progress accounting
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Delay between consecutive page fetches (milliseconds)
    pub page_delay_ms: u64,

    /// Hard ceiling on page navigation (milliseconds)
    pub navigation_timeout_ms: u64,

    /// Quiet period after which the network counts as idle (milliseconds)
    pub network_idle_ms: u64,

    /// Scroll increment used to trigger lazy-loaded content (pixels)
    pub scroll_step_px: u32,

    /// Pause between scroll increments (milliseconds)
    pub scroll_interval_ms: u64,

    /// Hard ceiling on the scroll pass (milliseconds)
    pub scroll_timeout_ms: u64,

    /// Settle period after scrolling (milliseconds)
    pub settle_ms: u64,

    /// Share of the progress range reserved for page crawling (percent)
    pub crawl_progress_share: u8,

    /// Maximum number of elements inspected for background images per page
    pub max_background_elements: usize,

    /// Drop sitemap URLs that robots.txt disallows
    pub respect_robots_txt: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_delay_ms: 500,
            navigation_timeout_ms: 60_000,
            network_idle_ms: 500,
            scroll_step_px: 300,
            scroll_interval_ms: 100,
            scroll_timeout_ms: 10_000,
            settle_ms: 2_000,
            crawl_progress_share: 80,
            max_background_elements: 5_000,
            respect_robots_txt: true,
        }
    }
}

impl CrawlerConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }

    pub fn scroll_interval(&self) -> Duration {
        Duration::from_millis(self.scroll_interval_ms)
    }

    pub fn scroll_timeout(&self) -> Duration {
        Duration::from_millis(self.scroll_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Directory that holds all buckets
    pub root_dir: String,

    /// Bucket that receives the archives
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Payloads at or above this size use the chunked upload path (bytes)
    #[serde(default = "default_direct_upload_limit")]
    pub direct_upload_limit: u64,

    /// Chunk size for resumable uploads (bytes)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Delay before each attempt of a chunk; its length bounds the attempts (milliseconds)
    #[serde(default = "default_chunk_retry_delays_ms")]
    pub chunk_retry_delays_ms: Vec<u64>,
}

fn default_bucket() -> String {
    "exports".to_string()
}

fn default_direct_upload_limit() -> u64 {
    50 * 1024 * 1024
}

fn default_chunk_size() -> u64 {
    6 * 1024 * 1024
}

fn default_chunk_retry_delays_ms() -> Vec<u64> {
    vec![0, 1_000, 3_000, 5_000]
}

/// Job and log record store
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
}
