//! DOM extraction over a rendered document
//!
//! Picks the title, the main content root and every image URL the page
//! references. Content selection runs through an ordered list of strategies;
//! the first one that matches wins.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Title used when the document has neither `<title>` nor `<h1>`
pub const UNTITLED: &str = "Untitled";

/// One way of locating the main content of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStrategy {
    pub name: &'static str,
    pub selector: &'static str,
}

/// Content strategies in priority order: semantic regions first, generic
/// containers next, the whole body last
pub const CONTENT_STRATEGIES: &[ContentStrategy] = &[
    ContentStrategy {
        name: "main",
        selector: "main",
    },
    ContentStrategy {
        name: "role-main",
        selector: r#"[role="main"]"#,
    },
    ContentStrategy {
        name: "duda-body",
        selector: ".dmBody",
    },
    ContentStrategy {
        name: "content-wrapper",
        selector: ".content-wrapper",
    },
    ContentStrategy {
        name: "content-id",
        selector: "#content",
    },
    ContentStrategy {
        name: "article",
        selector: "article",
    },
    ContentStrategy {
        name: "body",
        selector: "body",
    },
];

/// Lazy-load attributes, checked before `src`
const LAZY_SOURCE_ATTRS: &[&str] = &["data-src", "data-lazy-src"];

/// What was pulled out of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: String,
    /// Inner markup of the content root
    pub html: String,
    /// Name of the strategy that located the content root
    pub strategy: &'static str,
    /// Absolute image URLs, de-duplicated in first-seen order
    pub images: Vec<Url>,
}

/// Extracts title, content root and image URLs from `html`
///
/// Relative image sources are resolved against `page_url`. At most
/// `max_background_elements` elements are inspected for inline background
/// images.
pub fn extract_content(
    html: &str,
    page_url: &Url,
    max_background_elements: usize,
) -> ExtractedContent {
    let document = Html::parse_document(html);

    let (strategy, root_html) = select_content_root(&document);

    let mut images = ImageSet::default();
    for src in image_sources(&document) {
        if let Ok(url) = page_url.join(&src) {
            images.push(url);
        }
    }
    for src in background_image_urls(&document, max_background_elements) {
        if let Ok(url) = Url::parse(&src) {
            images.push(url);
        }
    }

    ExtractedContent {
        title: extract_title(&document),
        html: root_html,
        strategy,
        images: images.into_vec(),
    }
}

/// `<title>`, else the first `<h1>`, else [`UNTITLED`]
pub fn extract_title(document: &Html) -> String {
    ["title", "h1"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .next()
                .map(collapse_text)
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn collapse_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_content_root(document: &Html) -> (&'static str, String) {
    for strategy in CONTENT_STRATEGIES {
        let Ok(selector) = Selector::parse(strategy.selector) else {
            continue;
        };
        if let Some(el) = document.select(&selector).next() {
            return (strategy.name, el.inner_html());
        }
    }
    ("document", document.root_element().inner_html())
}

/// Preferred source of every `<img>`: lazy-load attribute, then `src`
fn image_sources(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|img| {
            let el = img.value();
            LAZY_SOURCE_ATTRS
                .iter()
                .chain(std::iter::once(&"src"))
                .filter_map(|attr| el.attr(attr))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(str::to_string)
        })
        .collect()
}

/// Absolute `url(...)` references in inline `background`/`background-image`
/// declarations
fn background_image_urls(document: &Html, max_elements: usize) -> Vec<String> {
    let Ok(selector) = Selector::parse("[style]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .take(max_elements)
        .filter_map(|el| el.value().attr("style"))
        .flat_map(style_background_urls)
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .collect()
}

/// `url(...)` arguments of background declarations in a style attribute
pub fn style_background_urls(style: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        if property != "background" && property != "background-image" {
            continue;
        }

        let mut rest = value;
        while let Some(start) = rest.find("url(") {
            let after = &rest[start + 4..];
            let Some(end) = after.find(')') else {
                break;
            };
            let raw = after[..end].trim().trim_matches(|c| c == '"' || c == '\'');
            if !raw.is_empty() {
                urls.push(raw.to_string());
            }
            rest = &after[end + 1..];
        }
    }
    urls
}

/// Ordered set of http(s) image URLs
#[derive(Default)]
struct ImageSet {
    seen: HashSet<String>,
    urls: Vec<Url>,
}

impl ImageSet {
    fn push(&mut self, url: Url) {
        if !matches!(url.scheme(), "http" | "https") {
            return;
        }
        if self.seen.insert(url.to_string()) {
            self.urls.push(url);
        }
    }

    fn into_vec(self) -> Vec<Url> {
        self.urls
    }
}
