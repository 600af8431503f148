//! Archive module
//!
//! Packs a crawl result into a single deflated zip with a JSON manifest.
//! Assembly is synchronous and touches no network.

mod builder;
mod manifest;

pub use builder::{
    archive_filename, build_archive, build_archive_at, page_document, ArchivePayload,
    COMPRESSION_LEVEL,
};
pub use manifest::{Manifest, PageSummary};
