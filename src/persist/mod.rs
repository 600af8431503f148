//! Persistence of finished archives
//!
//! [`ObjectStore`] is the seam to durable storage; [`LocalObjectStore`]
//! implements it on a directory tree. [`Uploader`] decides between a direct
//! write and a resumable chunked session based on payload size.

mod store;
mod upload;

pub use store::{LocalObjectStore, ObjectStore, ObjectStoreError, UploadSession};
pub use upload::{
    payload_fingerprint, storage_path, UploadMode, UploadPolicy, Uploader, ARCHIVE_CONTENT_TYPE,
    STALE_SESSION_AGE,
};
