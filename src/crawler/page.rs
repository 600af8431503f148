//! Per-page content extraction
//!
//! Render, scroll, settle, extract, convert, download images. Any error along
//! the way is logged against the job and the page is skipped.

use crate::config::CrawlerConfig;
use crate::crawler::convert::html_to_markdown;
use crate::crawler::extract::extract_content;
use crate::crawler::images::fetch_images;
use crate::crawler::render::{NavigateOptions, RenderError, Renderer};
use crate::crawler::{CrawlReporter, ScrapedPage};
use crate::state::LogLevel;
use crate::url::derive_slug;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Pacing and limits applied to every page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSettings {
    pub navigation: NavigateOptions,
    pub scroll_step_px: u32,
    pub scroll_interval: Duration,
    pub scroll_timeout: Duration,
    pub settle: Duration,
    pub max_background_elements: usize,
}

impl From<&CrawlerConfig> for PageSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            navigation: NavigateOptions {
                timeout: config.navigation_timeout(),
                idle: config.network_idle(),
            },
            scroll_step_px: config.scroll_step_px,
            scroll_interval: config.scroll_interval(),
            scroll_timeout: config.scroll_timeout(),
            settle: config.settle(),
            max_background_elements: config.max_background_elements,
        }
    }
}

/// Turns one page URL into a [`ScrapedPage`]
pub struct PageExtractor {
    client: Client,
    settings: PageSettings,
}

impl PageExtractor {
    pub fn new(client: Client, settings: PageSettings) -> Self {
        Self { client, settings }
    }

    /// Extracts `url`, or returns `None` after logging why it was skipped
    pub async fn extract(
        &self,
        renderer: &dyn Renderer,
        url: &Url,
        reporter: &dyn CrawlReporter,
    ) -> Option<ScrapedPage> {
        reporter
            .log(LogLevel::Info, &format!("Scraping: {}", url))
            .await;

        let html = match self.render(renderer, url).await {
            Ok(html) => html,
            Err(e) => {
                reporter
                    .log(
                        LogLevel::Error,
                        &format!("Failed to scrape {}: {}", url, e),
                    )
                    .await;
                return None;
            }
        };

        let content = extract_content(&html, url, self.settings.max_background_elements);
        debug!(
            "{}: content root via '{}', {} image(s) referenced",
            url,
            content.strategy,
            content.images.len()
        );

        let markdown = html_to_markdown(&content.html);
        let images = fetch_images(&self.client, &content.images, reporter).await;

        Some(ScrapedPage {
            source_url: url.to_string(),
            slug: derive_slug(url),
            title: content.title,
            markdown,
            images,
        })
    }

    /// Loads the page and returns its serialized DOM; the page is always closed
    async fn render(&self, renderer: &dyn Renderer, url: &Url) -> Result<String, RenderError> {
        let mut page = renderer.open(url, self.settings.navigation).await?;

        let scroll = page.scroll_through(
            self.settings.scroll_step_px,
            self.settings.scroll_interval,
        );
        match tokio::time::timeout(self.settings.scroll_timeout, scroll).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Scrolling {} failed: {}", url, e),
            Err(_) => debug!("Scrolling {} hit the scroll timeout", url),
        }

        tokio::time::sleep(self.settings.settle).await;

        let content = page.content().await;
        page.close().await;
        content
    }
}
