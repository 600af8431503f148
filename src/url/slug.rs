use url::Url;

/// Extensions that are accepted as-is on image filenames
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];

/// Extensions that never denote a crawlable page in a sitemap
pub const NON_PAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "pdf", "doc", "docx", "xml", "gz",
];

/// Derives the archive slug for a page from its URL path
///
/// Leading and trailing slashes are stripped, an empty path becomes `home`,
/// and remaining slashes become hyphens. Distinct paths may collide
/// (`/a/b` and `/a-b` both give `a-b`).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_export::url::derive_slug;
///
/// assert_eq!(derive_slug(&Url::parse("https://x.test/about-us/").unwrap()), "about-us");
/// assert_eq!(derive_slug(&Url::parse("https://x.test").unwrap()), "home");
/// assert_eq!(derive_slug(&Url::parse("https://x.test/a/b").unwrap()), "a-b");
/// ```
pub fn derive_slug(url: &Url) -> String {
    slug_from_path(url.path())
}

/// Slug derivation on a raw path, see [`derive_slug`]
pub fn slug_from_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return "home".to_string();
    }
    trimmed.replace('/', "-")
}

/// Replaces every character outside `[A-Za-z0-9.-]` with an underscore
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Lowercased extension of the last path segment, if any
pub fn path_extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether a filename already ends in a recognized image extension
/// (case-insensitive)
pub fn has_image_extension(filename: &str) -> bool {
    path_extension(filename)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Whether a URL points at something that is not a page
/// (images, documents, nested sitemaps)
pub fn is_non_page_url(url: &Url) -> bool {
    path_extension(url.path())
        .map(|ext| NON_PAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
