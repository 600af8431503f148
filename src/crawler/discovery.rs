//! Sitemap-driven page discovery
//!
//! Probes the well-known sitemap locations in order, then any `Sitemap:`
//! locations announced by robots.txt. The first document yielding at least
//! one page URL wins. Sitemap indexes are not followed; their child sitemap
//! URLs end in `.xml` and are filtered like any other non-page URL.

use crate::crawler::CrawlReporter;
use crate::robots::RobotsPolicy;
use crate::state::LogLevel;
use crate::url::is_non_page_url;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::collections::HashSet;
use url::Url;

/// Well-known sitemap paths, in probe order
pub const SITEMAP_LOCATIONS: [&str; 2] = ["/sitemap.xml", "/sitemap_index.xml"];

/// Pages found for a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub pages: Vec<Url>,
    /// Sitemap the pages came from; `None` when falling back to the origin
    pub sitemap: Option<Url>,
}

/// Sitemap URLs to probe for `base`, well-known locations first
pub fn sitemap_candidates(base: &Url, robots: &RobotsPolicy) -> Vec<Url> {
    let mut seen = HashSet::new();
    let well_known = SITEMAP_LOCATIONS
        .iter()
        .filter_map(|path| base.join(path).ok());
    let announced = robots
        .sitemaps()
        .into_iter()
        .filter_map(|s| Url::parse(&s).ok());

    well_known
        .chain(announced)
        .filter(|url| seen.insert(url.to_string()))
        .collect()
}

/// Returns the text of every `<loc>` element, in document order
pub fn parse_sitemap_locations(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut locations = Vec::new();
    let mut in_loc = false;
    let mut current = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"loc" => {
                in_loc = true;
                current.clear();
            }
            Event::Text(e) if in_loc => {
                current.push_str(&e.unescape()?);
            }
            Event::CData(e) if in_loc => {
                current.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::End(e) if e.local_name().as_ref() == b"loc" => {
                in_loc = false;
                let loc = current.trim();
                if !loc.is_empty() {
                    locations.push(loc.to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(locations)
}

/// Keeps page URLs only, de-duplicated in first-seen order
pub fn filter_page_urls(locations: &[String]) -> Vec<Url> {
    let mut seen = HashSet::new();
    locations
        .iter()
        .filter_map(|loc| Url::parse(loc).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| !is_non_page_url(url))
        .filter(|url| seen.insert(url.to_string()))
        .collect()
}

/// Discovers the page list for `base`
///
/// Never fails; a site without a usable sitemap is crawled as its origin only.
pub async fn discover_pages(
    client: &Client,
    base: &Url,
    robots: &RobotsPolicy,
    reporter: &dyn CrawlReporter,
) -> Discovery {
    reporter
        .log(LogLevel::Info, &format!("Fetching sitemap from {}", base))
        .await;

    for sitemap_url in sitemap_candidates(base, robots) {
        match fetch_sitemap(client, &sitemap_url).await {
            Ok(Some(pages)) if !pages.is_empty() => {
                reporter
                    .log(
                        LogLevel::Info,
                        &format!("Found {} pages in sitemap", pages.len()),
                    )
                    .await;
                return Discovery {
                    pages,
                    sitemap: Some(sitemap_url),
                };
            }
            Ok(_) => {}
            Err(reason) => {
                reporter
                    .log(
                        LogLevel::Warn,
                        &format!("Failed to fetch {}: {}", sitemap_url, reason),
                    )
                    .await;
            }
        }
    }

    reporter
        .log(
            LogLevel::Warn,
            "No sitemap found, will scrape base URL only",
        )
        .await;
    Discovery {
        pages: vec![base.clone()],
        sitemap: None,
    }
}

/// `Ok(None)` for a non-success status, which is simply "not here"
async fn fetch_sitemap(client: &Client, url: &Url) -> Result<Option<Vec<Url>>, String> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        tracing::debug!("No sitemap at {} ({})", url, response.status());
        return Ok(None);
    }

    let xml = response.text().await.map_err(|e| e.to_string())?;
    let locations = parse_sitemap_locations(&xml).map_err(|e| e.to_string())?;
    Ok(Some(filter_page_urls(&locations)))
}
