//! Robots.txt handling module
//!
//! robots.txt is consulted once per job: its `Sitemap:` lines extend page
//! discovery, and its rules optionally filter the discovered pages.

mod parser;

pub use parser::RobotsPolicy;

use tracing::{debug, warn};
use url::Url;

/// Fetches robots.txt for the origin of `base`
///
/// Never fails: a missing file, an error status or a transport error all
/// yield an allow-all policy.
pub async fn fetch_robots(client: &reqwest::Client, base: &Url) -> RobotsPolicy {
    let robots_url = match base.join("/robots.txt") {
        Ok(url) => url,
        Err(_) => return RobotsPolicy::allow_all(),
    };

    let response = match client.get(robots_url.as_str()).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to fetch {}: {}", robots_url, e);
            return RobotsPolicy::allow_all();
        }
    };

    if !response.status().is_success() {
        debug!("No robots.txt at {} ({})", robots_url, response.status());
        return RobotsPolicy::allow_all();
    }

    match response.text().await {
        Ok(body) => RobotsPolicy::from_content(&body),
        Err(e) => {
            warn!("Failed to read {}: {}", robots_url, e);
            RobotsPolicy::allow_all()
        }
    }
}
