//! HTML to Markdown conversion
//!
//! Thin wrapper around `htmd` with ATX headings, `-` list markers and fenced
//! code blocks. Script-like elements are dropped with their content, and
//! images prefer their lazy-load source.

use htmd::options::{BulletListMarker, CodeBlockStyle, HeadingStyle, Options};
use htmd::{Element, HtmlToMarkdown};
use scraper::Html;
use tracing::warn;

/// Elements removed together with everything inside them
const STRIPPED: &[&str] = &["script", "style", "noscript", "iframe", "template", "head"];

/// Image source attributes in order of preference
const IMAGE_SOURCES: &[&str] = &["data-src", "data-lazy-src", "src"];

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .skip_tags(STRIPPED.to_vec())
        .options(Options {
            heading_style: HeadingStyle::Atx,
            bullet_list_marker: BulletListMarker::Dash,
            code_block_style: CodeBlockStyle::Fenced,
            ..Default::default()
        })
        .add_handler(vec!["img"], render_image)
        .build()
}

/// `![alt](src)`, preferring the lazy-load source; nothing without a source
fn render_image(element: Element) -> Option<String> {
    let attr = |name: &str| {
        element
            .attrs
            .iter()
            .find(|a| &*a.name.local == name)
            .map(|a| a.value.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let src = IMAGE_SOURCES.iter().find_map(|name| attr(name))?;
    Some(format!("![{}]({})", attr("alt").unwrap_or_default(), src))
}

/// Converts an HTML fragment to Markdown
///
/// Falls back to the fragment's plain text if conversion fails.
///
/// # Example
///
/// ```
/// use site_export::crawler::html_to_markdown;
///
/// let md = html_to_markdown("<h2>Menu</h2><p>Tea and cake</p>");
/// assert_eq!(md, "## Menu\n\nTea and cake");
/// ```
pub fn html_to_markdown(html: &str) -> String {
    match converter().convert(html) {
        Ok(markdown) => markdown.trim().to_string(),
        Err(e) => {
            warn!("Markdown conversion failed, keeping plain text: {}", e);
            plain_text(html)
        }
    }
}

fn plain_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
