//! Image fetcher
//!
//! Downloads harvested image URLs one at a time. A failed download is logged
//! at warn and the image is left out; it never fails the page.

use crate::crawler::fetcher::content_type;
use crate::crawler::{CrawlReporter, ScrapedImage};
use crate::state::LogLevel;
use crate::url::{has_image_extension, sanitize_filename};
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Why a single image could not be downloaded
#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(StatusCode),
}

/// Extension implied by a declared content type; `jpg` when unknown
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let ct = content_type.unwrap_or("");
    if ct.contains("png") {
        "png"
    } else if ct.contains("gif") {
        "gif"
    } else if ct.contains("webp") {
        "webp"
    } else if ct.contains("svg") {
        "svg"
    } else {
        "jpg"
    }
}

/// Archive filename for an image
///
/// Last path segment (or `image`), an extension from the content type when
/// the segment has no recognized one, then sanitized to `[A-Za-z0-9.-]`.
pub fn resolve_filename(url: &Url, content_type: Option<&str>) -> String {
    let mut filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("image")
        .to_string();

    if !has_image_extension(&filename) {
        filename.push('.');
        filename.push_str(extension_for_content_type(content_type));
    }

    sanitize_filename(&filename)
}

/// Downloads one image
pub async fn fetch_image(client: &Client, url: &Url) -> Result<ScrapedImage, ImageFetchError> {
    let response = client.get(url.as_str()).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ImageFetchError::Status(status));
    }

    let content_type = content_type(&response);
    let bytes = response.bytes().await?;

    Ok(ScrapedImage {
        original_url: url.to_string(),
        filename: resolve_filename(url, content_type.as_deref()),
        bytes: bytes.to_vec(),
    })
}

/// Downloads every URL in order, skipping failures
///
/// Filenames are made unique within the returned set so each image gets its
/// own archive entry.
pub async fn fetch_images(
    client: &Client,
    urls: &[Url],
    reporter: &dyn CrawlReporter,
) -> Vec<ScrapedImage> {
    let mut images = Vec::with_capacity(urls.len());
    let mut used = HashSet::new();

    for url in urls {
        match fetch_image(client, url).await {
            Ok(mut image) => {
                image.filename = unique_filename(&mut used, &image.filename);
                images.push(image);
            }
            Err(e) => {
                reporter
                    .log(
                        LogLevel::Warn,
                        &format!("Failed to download image: {} ({})", url, e),
                    )
                    .await;
            }
        }
    }

    images
}

/// `name`, or `stem-2.ext`, `stem-3.ext`... when already taken
fn unique_filename(used: &mut HashSet<String>, name: &str) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
