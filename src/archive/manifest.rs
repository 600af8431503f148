//! Archive manifest
//!
//! `manifest.json` is read by downstream tools, so field names and shape are
//! stable: camelCase keys, pretty-printed.

use crate::crawler::ScrapeResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Contents of `manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// ISO-8601 UTC with millisecond precision
    pub exported_at: String,
    pub source_url: String,
    pub total_pages: usize,
    pub total_images: usize,
    pub pages: Vec<PageSummary>,
}

/// Per-page entry of the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub url: String,
    pub slug: String,
    pub title: String,
    pub image_count: usize,
}

impl Manifest {
    pub fn from_result(result: &ScrapeResult, exported_at: DateTime<Utc>) -> Self {
        Self {
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            source_url: result.base_url.clone(),
            total_pages: result.pages.len(),
            total_images: result.total_images,
            pages: result
                .pages
                .iter()
                .map(|p| PageSummary {
                    url: p.source_url.clone(),
                    slug: p.slug.clone(),
                    title: p.title.clone(),
                    image_count: p.images.len(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
