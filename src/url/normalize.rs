use crate::UrlError;
use url::Url;

/// Normalizes a URL typed by a submitter
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace; reject if empty
/// 2. Prefix `https://` when the input does not start with `http`
/// 3. Parse; reject if malformed
/// 4. Only HTTP and HTTPS schemes are accepted
/// 5. A host is required
///
/// # Examples
///
/// ```
/// use site_export::url::normalize_submitted_url;
///
/// let url = normalize_submitted_url("  example.com/about ").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/about");
/// ```
pub fn normalize_submitted_url(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let candidate = if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| UrlError::Parse(e.to_string()))?;
    check_http_url(&url)?;
    Ok(url)
}

/// Normalizes a crawl target to its origin (scheme, host and port)
///
/// Everything after the authority is discarded: discovery always starts
/// from the site root.
///
/// # Examples
///
/// ```
/// use site_export::url::normalize_target;
///
/// let origin = normalize_target("https://Example.com/blog/post?id=1#top").unwrap();
/// assert_eq!(origin.as_str(), "https://example.com/");
/// ```
pub fn normalize_target(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    check_http_url(&url)?;

    let origin = url.origin().ascii_serialization();
    Url::parse(&origin).map_err(|e| UrlError::Parse(e.to_string()))
}

/// Renders an origin URL the way it is reported in manifests and logs
/// (no trailing slash)
pub fn origin_string(origin: &Url) -> String {
    origin.origin().ascii_serialization()
}

fn check_http_url(url: &Url) -> Result<(), UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(UrlError::MissingDomain),
    }
}
