//! Site-Export: website to Markdown archive exporter
//!
//! This crate implements the job-processing pipeline that turns a remote website
//! into a portable zip archive of Markdown pages and harvested images. Work items
//! are pulled from a durable queue, crawled page by page, archived, and persisted
//! to an object store while progress and logs are reported to a job store.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod dispatcher;
pub mod output;
pub mod persist;
pub mod queue;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Export operations
///
/// The `Display` form of this error is what ends up in a failed job's
/// `error_message`, so variants carry human-readable context.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid target URL '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Rendering error: {0}")]
    Render(#[from] crawler::RenderError),

    #[error("Job store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Failed to upload: {0}")]
    Upload(#[from] persist::ObjectStoreError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Empty URL")]
    Empty,
}

/// Result type alias for Site-Export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use archive::{build_archive, ArchivePayload};
pub use config::Config;
pub use crawler::{ScrapeResult, ScrapedImage, ScrapedPage};
pub use dispatcher::{Dispatcher, JobProcessor, JobSummary};
pub use queue::WorkItem;
pub use state::{JobStatus, LogLevel};
pub use storage::{JobRecord, JobStore, LogEntry};
