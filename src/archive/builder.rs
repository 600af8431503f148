//! Zip archive assembly
//!
//! Layout:
//!
//! ```text
//! manifest.json
//! pages/<slug>.md
//! images/<slug>/<filename>
//! ```

use crate::archive::manifest::Manifest;
use crate::crawler::{ScrapeResult, ScrapedPage};
use crate::url::host_label;
use crate::ExportError;
use chrono::{DateTime, Utc};
use std::io::{Cursor, Write};
use url::Url;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level used for every entry
pub const COMPRESSION_LEVEL: i64 = 9;

/// A finished archive, ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    /// Exact byte length of `bytes`
    pub total_size: u64,
}

/// Builds the archive for `result`, stamped with the current time
pub fn build_archive(result: &ScrapeResult) -> Result<ArchivePayload, ExportError> {
    build_archive_at(result, Utc::now())
}

/// Builds the archive for `result` as if exported at `now`
pub fn build_archive_at(
    result: &ScrapeResult,
    now: DateTime<Utc>,
) -> Result<ArchivePayload, ExportError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let manifest = Manifest::from_result(result, now).to_json()?;
    zip.start_file("manifest.json", options)?;
    zip.write_all(manifest.as_bytes())?;

    zip.add_directory("pages/", options)?;
    for page in &result.pages {
        zip.start_file(format!("pages/{}.md", page.slug), options)?;
        zip.write_all(page_document(page).as_bytes())?;

        for image in &page.images {
            zip.start_file(format!("images/{}/{}", page.slug, image.filename), options)?;
            zip.write_all(&image.bytes)?;
        }
    }

    let bytes = zip.finish()?.into_inner();

    Ok(ArchivePayload {
        total_size: bytes.len() as u64,
        filename: archive_filename(&result.base_url, now),
        bytes,
    })
}

/// Body of `pages/<slug>.md`
pub fn page_document(page: &ScrapedPage) -> String {
    format!(
        "# {}\n\n> Source: {}\n\n---\n\n{}",
        page.title, page.source_url, page.markdown
    )
}

/// `export-<host-with-dashes>-<unix-millis>.zip`
pub fn archive_filename(base_url: &str, now: DateTime<Utc>) -> String {
    let host = Url::parse(base_url)
        .map(|url| host_label(&url))
        .unwrap_or_else(|_| "site".to_string());
    format!("export-{}-{}.zip", host, now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ScrapedImage;
    use chrono::TimeZone;
    use std::io::Read;
    use zip::ZipArchive;

    fn sample() -> ScrapeResult {
        ScrapeResult {
            base_url: "https://www.example.test".to_string(),
            pages: vec![
                ScrapedPage {
                    source_url: "https://www.example.test/".to_string(),
                    slug: "home".to_string(),
                    title: "Home".to_string(),
                    markdown: "Welcome".to_string(),
                    images: vec![ScrapedImage {
                        original_url: "https://cdn.test/logo.png".to_string(),
                        filename: "logo.png".to_string(),
                        bytes: vec![0x89, 0x50, 0x4e, 0x47],
                    }],
                },
                ScrapedPage {
                    source_url: "https://www.example.test/about".to_string(),
                    slug: "about".to_string(),
                    title: "About".to_string(),
                    markdown: "Us".to_string(),
                    images: vec![],
                },
            ],
            total_images: 1,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut file = archive.by_name(name).unwrap();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_layout_and_contents() {
        let payload = build_archive_at(&sample(), at()).unwrap();
        assert_eq!(payload.total_size, payload.bytes.len() as u64);

        let mut archive = ZipArchive::new(Cursor::new(payload.bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        for expected in [
            "manifest.json",
            "pages/home.md",
            "pages/about.md",
            "images/home/logo.png",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }

        let home = String::from_utf8(read_entry(&mut archive, "pages/home.md")).unwrap();
        assert_eq!(
            home,
            "# Home\n\n> Source: https://www.example.test/\n\n---\n\nWelcome"
        );
        assert_eq!(
            read_entry(&mut archive, "images/home/logo.png"),
            vec![0x89, 0x50, 0x4e, 0x47]
        );

        let manifest: Manifest =
            serde_json::from_slice(&read_entry(&mut archive, "manifest.json")).unwrap();
        assert_eq!(manifest.total_pages, 2);
        assert_eq!(manifest.total_images, 1);
    }

    #[test]
    fn test_entries_are_deflated() {
        let payload = build_archive_at(&sample(), at()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(payload.bytes)).unwrap();
        let file = archive.by_name("pages/home.md").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Deflated);
    }

    #[test]
    fn test_empty_result_still_has_pages_dir() {
        let empty = ScrapeResult {
            base_url: "https://example.test".to_string(),
            pages: vec![],
            total_images: 0,
        };
        let payload = build_archive_at(&empty, at()).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(payload.bytes)).unwrap();
        assert!(archive.file_names().any(|n| n == "pages/"));

        let manifest: Manifest =
            serde_json::from_slice(&read_entry(&mut archive, "manifest.json")).unwrap();
        assert_eq!(manifest.total_pages, 0);
    }

    #[test]
    fn test_archive_filename() {
        assert_eq!(
            archive_filename("https://www.example.test", at()),
            "export-www-example-test-1714564800000.zip"
        );
    }
}
