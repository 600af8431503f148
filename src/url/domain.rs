use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_export::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Turns a host into a label safe for archive filenames
///
/// Dots become hyphens, and anything outside `[A-Za-z0-9-]` becomes an
/// underscore so IPv6 brackets and colons never leak into a filename.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_export::url::host_label;
///
/// let url = Url::parse("https://www.example.com/").unwrap();
/// assert_eq!(host_label(&url), "www-example-com");
/// ```
pub fn host_label(url: &Url) -> String {
    let host = extract_domain(url).unwrap_or_else(|| "site".to_string());
    host.chars()
        .map(|c| match c {
            '.' => '-',
            c if c.is_ascii_alphanumeric() || c == '-' => c,
            _ => '_',
        })
        .collect()
}
