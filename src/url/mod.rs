//! URL handling module for Site-Export
//!
//! This module provides target normalization, slug derivation, and the
//! filename rules used for archive entries.

mod domain;
mod normalize;
mod slug;

pub use domain::{extract_domain, host_label};
pub use normalize::{normalize_submitted_url, normalize_target, origin_string};
pub use slug::{
    derive_slug, has_image_extension, is_non_page_url, path_extension, sanitize_filename,
    slug_from_path, IMAGE_EXTENSIONS, NON_PAGE_EXTENSIONS,
};
