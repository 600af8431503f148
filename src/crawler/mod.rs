//! Crawler module for site discovery and page extraction
//!
//! This module contains the per-job crawl, including:
//! - HTTP client construction
//! - The rendering capability and its HTTP implementation
//! - Sitemap discovery
//! - Content extraction and Markdown conversion
//! - Image downloads
//! - Overall crawl orchestration

mod convert;
mod coordinator;
mod discovery;
mod extract;
mod fetcher;
mod images;
mod page;
mod render;

pub use convert::html_to_markdown;
pub use coordinator::CrawlOrchestrator;
pub use discovery::{
    discover_pages, filter_page_urls, parse_sitemap_locations, sitemap_candidates, Discovery,
    SITEMAP_LOCATIONS,
};
pub use extract::{extract_content, ContentStrategy, ExtractedContent, CONTENT_STRATEGIES};
pub use fetcher::{build_http_client, MAX_REDIRECTS};
pub use images::{fetch_image, fetch_images, resolve_filename, ImageFetchError};
pub use page::{PageExtractor, PageSettings};
pub use render::{
    HttpRenderer, HttpRendererFactory, NavigateOptions, RenderError, RenderedPage, Renderer,
    RendererFactory,
};

use crate::state::LogLevel;
use async_trait::async_trait;

/// A downloaded image belonging to a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedImage {
    pub original_url: String,
    /// Sanitized, extension-resolved, unique within its page
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One extracted page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPage {
    pub source_url: String,
    pub slug: String,
    pub title: String,
    pub markdown: String,
    /// In harvest order
    pub images: Vec<ScrapedImage>,
}

/// Output of one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResult {
    /// Origin of the target, without a trailing slash
    pub base_url: String,
    /// In discovery order
    pub pages: Vec<ScrapedPage>,
    pub total_images: usize,
}

/// Receives job-scoped logs and progress from a crawl
#[async_trait]
pub trait CrawlReporter: Send + Sync {
    async fn log(&self, level: LogLevel, message: &str);

    /// Reports overall job progress in percent
    async fn progress(&self, percent: u8);
}
