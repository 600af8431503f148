//! Size-aware archive upload
//!
//! Payloads below the direct limit go up in one overwrite-if-exists write.
//! Larger payloads use a chunked session keyed by a SHA-256 fingerprint of
//! the destination and the bytes, so a retried upload skips every chunk the
//! store already acknowledged.

use crate::archive::ArchivePayload;
use crate::config::StorageConfig;
use crate::persist::store::{ObjectStore, ObjectStoreError, UploadSession};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Content type of every uploaded archive
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Upload sessions untouched this long are abandoned and purged
pub const STALE_SESSION_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Thresholds and retry schedule for uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Payloads of at least this many bytes use the chunked path
    pub direct_limit: u64,
    pub chunk_size: u64,
    /// Delay before each attempt of a chunk; its length is the attempt budget
    pub retry_delays: Vec<Duration>,
}

impl From<&StorageConfig> for UploadPolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            direct_limit: config.direct_upload_limit,
            chunk_size: config.chunk_size.max(1),
            retry_delays: config
                .chunk_retry_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        }
    }
}

/// How a payload was persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Direct,
    Chunked {
        /// Chunks sent by this call (already acknowledged chunks excluded)
        chunks_sent: usize,
    },
}

/// Storage path of a job's archive: `<job-id>/<filename>`
pub fn storage_path(job_id: &str, filename: &str) -> String {
    format!("{}/{}", job_id, filename)
}

/// SHA-256 over destination, size and bytes, hex-encoded
pub fn payload_fingerprint(path: &str, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Persists archives to an [`ObjectStore`]
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    policy: UploadPolicy,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, policy: UploadPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Uploads `payload` to `path`, picking the strategy by size
    pub async fn upload(
        &self,
        path: &str,
        payload: &ArchivePayload,
    ) -> Result<UploadMode, ObjectStoreError> {
        if payload.total_size < self.policy.direct_limit {
            self.store
                .put_object(path, &payload.bytes, ARCHIVE_CONTENT_TYPE, true)
                .await?;
            return Ok(UploadMode::Direct);
        }

        self.upload_chunked(path, &payload.bytes).await
    }

    async fn upload_chunked(
        &self,
        path: &str,
        bytes: &[u8],
    ) -> Result<UploadMode, ObjectStoreError> {
        let total = bytes.len() as u64;
        let fingerprint = payload_fingerprint(path, bytes);

        let session = self
            .with_retries("create session", || {
                self.store
                    .create_session(path, total, ARCHIVE_CONTENT_TYPE, &fingerprint)
            })
            .await?;

        if session.acknowledged > 0 {
            debug!(
                "Resuming upload of {} at byte {} of {}",
                path, session.acknowledged, total
            );
        }

        match self.send_chunks(&session, bytes).await {
            Ok(chunks_sent) => Ok(UploadMode::Chunked { chunks_sent }),
            Err(e) => {
                if let Err(abort) = self.store.abort_session(&session.id).await {
                    warn!("Failed to discard upload session for {}: {}", path, abort);
                }
                Err(e)
            }
        }
    }

    /// Sends every chunk past the acknowledged offset and completes the session
    async fn send_chunks(
        &self,
        session: &UploadSession,
        bytes: &[u8],
    ) -> Result<usize, ObjectStoreError> {
        let total = bytes.len() as u64;
        let session_id = session.id.as_str();
        let mut offset = session.acknowledged.min(total);
        let mut chunks_sent = 0;

        while offset < total {
            let start = offset;
            let end = (start + self.policy.chunk_size).min(total);
            let chunk = &bytes[start as usize..end as usize];

            offset = self
                .with_retries("upload chunk", || async move {
                    match self.store.put_chunk(session_id, start, chunk).await {
                        // The chunk landed but its acknowledgement was lost
                        Err(ObjectStoreError::OffsetMismatch { expected, .. }) if expected == end => {
                            Ok(expected)
                        }
                        other => other,
                    }
                })
                .await?;
            chunks_sent += 1;
        }

        self.with_retries("complete session", || {
            self.store.complete_session(session_id)
        })
        .await?;

        Ok(chunks_sent)
    }

    /// Discards upload sessions untouched for at least `max_age`
    pub async fn purge_stale_sessions(&self, max_age: Duration) -> Result<usize, ObjectStoreError> {
        self.store.purge_sessions(max_age).await
    }

    /// Runs `op` once per entry of the retry schedule, sleeping the entry's
    /// delay first; returns the last error when every attempt fails
    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ObjectStoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ObjectStoreError>>,
    {
        let mut last_error = None;
        let attempts = self.policy.retry_delays.len().max(1);

        for attempt in 0..attempts {
            let delay = self
                .policy
                .retry_delays
                .get(attempt)
                .copied()
                .unwrap_or_default();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("{} failed (attempt {}/{}): {}", what, attempt + 1, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ObjectStoreError::Io(std::io::Error::other(format!("{} was never attempted", what)))
        }))
    }
}
