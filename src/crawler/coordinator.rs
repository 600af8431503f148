//! Crawl orchestrator - per-job crawl logic
//!
//! Discovers the page list of a site, visits pages strictly in discovery
//! order with a polite delay between them, and aggregates what could be
//! extracted. A page that fails is skipped; only a malformed target or a
//! renderer that cannot start fails the crawl.

use crate::config::Config;
use crate::crawler::discovery::discover_pages;
use crate::crawler::page::{PageExtractor, PageSettings};
use crate::crawler::render::{Renderer, RendererFactory};
use crate::crawler::{CrawlReporter, ScrapeResult};
use crate::robots::{fetch_robots, RobotsPolicy};
use crate::state::{LogLevel, ProgressPlan};
use crate::url::{normalize_target, origin_string};
use crate::ExportError;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Runs the crawl stage of a job
pub struct CrawlOrchestrator {
    client: Client,
    renderers: Arc<dyn RendererFactory>,
    extractor: PageExtractor,
    plan: ProgressPlan,
    page_delay: Duration,
    respect_robots_txt: bool,
    robots_agent: String,
}

impl CrawlOrchestrator {
    pub fn new(config: &Config, client: Client, renderers: Arc<dyn RendererFactory>) -> Self {
        let crawler = &config.crawler;
        Self {
            extractor: PageExtractor::new(client.clone(), PageSettings::from(crawler)),
            client,
            renderers,
            plan: ProgressPlan::new(crawler.crawl_progress_share),
            page_delay: crawler.page_delay(),
            respect_robots_txt: crawler.respect_robots_txt,
            robots_agent: config.user_agent.crawler_name.clone(),
        }
    }

    pub fn progress_plan(&self) -> ProgressPlan {
        self.plan
    }

    /// Crawls `target_url` and returns everything that could be extracted
    ///
    /// The renderer launched for this call is closed before returning,
    /// whatever the outcome.
    pub async fn scrape(
        &self,
        target_url: &str,
        reporter: &dyn CrawlReporter,
    ) -> Result<ScrapeResult, ExportError> {
        let base = normalize_target(target_url).map_err(|e| ExportError::InvalidTarget {
            url: target_url.to_string(),
            reason: e.to_string(),
        })?;

        let renderer = self.renderers.launch().await?;
        reporter.log(LogLevel::Info, "Renderer initialized").await;

        let result = self.crawl(&base, renderer.as_ref(), reporter).await;
        renderer.close().await;
        Ok(result)
    }

    async fn crawl(
        &self,
        base: &Url,
        renderer: &dyn Renderer,
        reporter: &dyn CrawlReporter,
    ) -> ScrapeResult {
        let robots = fetch_robots(&self.client, base).await;
        let discovery = discover_pages(&self.client, base, &robots, reporter).await;

        let urls = if discovery.sitemap.is_some() && self.respect_robots_txt {
            self.allowed_pages(discovery.pages, &robots, reporter).await
        } else {
            discovery.pages
        };

        let total = urls.len();
        let mut pages = Vec::with_capacity(total);
        let mut slugs = HashSet::new();
        let mut total_images = 0;

        for (index, url) in urls.iter().enumerate() {
            reporter.progress(self.plan.before_page(index, total)).await;

            if index > 0 {
                tokio::time::sleep(self.page_delay).await;
            }

            if let Some(mut page) = self.extractor.extract(renderer, url, reporter).await {
                page.slug = unique_slug(&mut slugs, &page.slug);
                total_images += page.images.len();
                pages.push(page);
            }
        }

        reporter
            .log(
                LogLevel::Info,
                &format!(
                    "Scraping complete: {} pages, {} images",
                    pages.len(),
                    total_images
                ),
            )
            .await;

        ScrapeResult {
            base_url: origin_string(base),
            pages,
            total_images,
        }
    }

    async fn allowed_pages(
        &self,
        pages: Vec<Url>,
        robots: &RobotsPolicy,
        reporter: &dyn CrawlReporter,
    ) -> Vec<Url> {
        let mut allowed = Vec::with_capacity(pages.len());
        for url in pages {
            if robots.is_allowed(url.as_str(), &self.robots_agent) {
                allowed.push(url);
            } else {
                reporter
                    .log(
                        LogLevel::Info,
                        &format!("Skipping {}: disallowed by robots.txt", url),
                    )
                    .await;
            }
        }
        allowed
    }
}

/// `slug`, or `slug-2`, `slug-3`... when an earlier page already took it
fn unique_slug(used: &mut HashSet<String>, slug: &str) -> String {
    if used.insert(slug.to_string()) {
        return slug.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", slug, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
