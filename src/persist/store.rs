//! Object store trait and filesystem implementation
//!
//! Objects live under `<root-dir>/<bucket>/<path>`. Chunked sessions are
//! staged under `<root-dir>/<bucket>/.sessions/<fingerprint>/` and moved into
//! place on completion, so a reader never sees a partially written object.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Errors returned by an object store
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error("unknown upload session: {0}")]
    UnknownSession(String),

    #[error("chunk offset {got} does not match acknowledged offset {expected}")]
    OffsetMismatch { expected: u64, got: u64 },

    #[error("upload session incomplete: {received} of {expected} bytes received")]
    Incomplete { expected: u64, received: u64 },

    #[error("corrupt session metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// An open chunked upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub id: String,
    /// Bytes already acknowledged; the next chunk must start here
    pub acknowledged: u64,
}

/// Durable object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes a whole object in one request
    async fn put_object(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), ObjectStoreError>;

    /// Opens (or resumes) a chunked upload for `path`
    ///
    /// A session created with the same `fingerprint` resumes where the
    /// previous one stopped.
    async fn create_session(
        &self,
        path: &str,
        total_size: u64,
        content_type: &str,
        fingerprint: &str,
    ) -> Result<UploadSession, ObjectStoreError>;

    /// Appends a chunk at `offset`; returns the new acknowledged offset
    async fn put_chunk(
        &self,
        session_id: &str,
        offset: u64,
        bytes: &[u8],
    ) -> Result<u64, ObjectStoreError>;

    /// Publishes the uploaded bytes at the session's path
    async fn complete_session(&self, session_id: &str) -> Result<(), ObjectStoreError>;

    /// Drops a session and everything it received; unknown sessions are ignored
    async fn abort_session(&self, session_id: &str) -> Result<(), ObjectStoreError>;

    /// Drops sessions that received nothing for at least `max_age`
    async fn purge_sessions(&self, max_age: Duration) -> Result<usize, ObjectStoreError>;
}

const SESSIONS_DIR: &str = ".sessions";
const SESSION_META: &str = "meta.json";
const SESSION_DATA: &str = "data.part";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionMeta {
    path: String,
    total_size: u64,
    content_type: String,
}

/// Object store backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Store rooted at `<root_dir>/<bucket>`
    pub fn new(root_dir: impl AsRef<Path>, bucket: &str) -> Self {
        Self {
            root: root_dir.as_ref().join(bucket),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of an object path
    pub fn object_path(&self, path: &str) -> Result<PathBuf, ObjectStoreError> {
        let relative = Path::new(path);
        let valid = !path.is_empty()
            && !path.starts_with(SESSIONS_DIR)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(ObjectStoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn session_dir(&self, session_id: &str) -> Result<PathBuf, ObjectStoreError> {
        if session_id.is_empty() || !session_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ObjectStoreError::UnknownSession(session_id.to_string()));
        }
        Ok(self.root.join(SESSIONS_DIR).join(session_id))
    }

    async fn read_meta(&self, dir: &Path) -> Result<Option<SessionMeta>, ObjectStoreError> {
        match fs::read(dir.join(SESSION_META)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn received(dir: &Path) -> Result<u64, ObjectStoreError> {
        match fs::metadata(dir.join(SESSION_DATA)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(
        &self,
        path: &str,
        bytes: &[u8],
        _content_type: &str,
        overwrite: bool,
    ) -> Result<(), ObjectStoreError> {
        let target = self.object_path(path)?;
        if !overwrite && fs::try_exists(&target).await? {
            return Err(ObjectStoreError::AlreadyExists(path.to_string()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut staging = target.clone().into_os_string();
        staging.push(".upload");
        let staging = PathBuf::from(staging);
        fs::write(&staging, bytes).await?;
        fs::rename(&staging, &target).await?;
        Ok(())
    }

    async fn create_session(
        &self,
        path: &str,
        total_size: u64,
        content_type: &str,
        fingerprint: &str,
    ) -> Result<UploadSession, ObjectStoreError> {
        self.object_path(path)?;
        let dir = self.session_dir(fingerprint)?;
        let meta = SessionMeta {
            path: path.to_string(),
            total_size,
            content_type: content_type.to_string(),
        };

        if self.read_meta(&dir).await?.as_ref() == Some(&meta) {
            let acknowledged = Self::received(&dir).await?.min(total_size);
            return Ok(UploadSession {
                id: fingerprint.to_string(),
                acknowledged,
            });
        }

        if fs::try_exists(&dir).await? {
            fs::remove_dir_all(&dir).await?;
        }
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(SESSION_META), serde_json::to_vec(&meta)?).await?;
        fs::write(dir.join(SESSION_DATA), b"").await?;

        Ok(UploadSession {
            id: fingerprint.to_string(),
            acknowledged: 0,
        })
    }

    async fn put_chunk(
        &self,
        session_id: &str,
        offset: u64,
        bytes: &[u8],
    ) -> Result<u64, ObjectStoreError> {
        let dir = self.session_dir(session_id)?;
        if self.read_meta(&dir).await?.is_none() {
            return Err(ObjectStoreError::UnknownSession(session_id.to_string()));
        }

        let received = Self::received(&dir).await?;
        if offset != received {
            return Err(ObjectStoreError::OffsetMismatch {
                expected: received,
                got: offset,
            });
        }

        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(dir.join(SESSION_DATA))
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        Ok(received + bytes.len() as u64)
    }

    async fn complete_session(&self, session_id: &str) -> Result<(), ObjectStoreError> {
        let dir = self.session_dir(session_id)?;
        let meta = self
            .read_meta(&dir)
            .await?
            .ok_or_else(|| ObjectStoreError::UnknownSession(session_id.to_string()))?;

        let received = Self::received(&dir).await?;
        if received != meta.total_size {
            return Err(ObjectStoreError::Incomplete {
                expected: meta.total_size,
                received,
            });
        }

        let target = self.object_path(&meta.path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(dir.join(SESSION_DATA), &target).await?;
        fs::remove_dir_all(&dir).await?;
        Ok(())
    }

    async fn abort_session(&self, session_id: &str) -> Result<(), ObjectStoreError> {
        let dir = self.session_dir(session_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_sessions(&self, max_age: Duration) -> Result<usize, ObjectStoreError> {
        let mut entries = match fs::read_dir(self.root.join(SESSIONS_DIR)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let dir = entry.path();
            let touched = match fs::metadata(dir.join(SESSION_DATA)).await {
                Ok(meta) => meta.modified()?,
                Err(_) => entry.metadata().await?.modified()?,
            };
            if now.duration_since(touched).unwrap_or_default() >= max_age {
                fs::remove_dir_all(&dir).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
