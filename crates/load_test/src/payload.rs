// Rust guideline compliant 2026-10-18

//! Write-payload preparation and cleanup.
//!
//! A [`Payload`] is a file of random bytes created once before any worker
//! starts and removed when the value is dropped. Its content is loaded into
//! one shared buffer; PUT operations send a prefix of that buffer without
//! copying it. Nothing writes to either after creation.

use bytes::Bytes;
use rand::RngCore;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};

const CHUNK: usize = 64 * 1024;

/// Errors from payload preparation.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The requested size is negative.
    #[error("payload size must not be negative, got {size}")]
    NegativeSize {
        /// Requested size.
        size: i64,
    },
    /// Creating, writing or reading the payload file failed.
    #[error("payload file {}: {source}", path.display())]
    Io {
        /// File concerned.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Write `len` random bytes to `out`.
///
/// # Errors
///
/// Propagates any write error.
pub(crate) async fn write_random<W>(out: &mut W, len: u64) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; CHUNK];
    let mut left = len;
    while left > 0 {
        let n = usize::try_from(left).map_or(CHUNK, |left| left.min(CHUNK));
        rand::rng().fill_bytes(&mut chunk[..n]);
        out.write_all(&chunk[..n]).await?;
        left -= n as u64;
    }
    out.flush().await
}

/// Ephemeral random-content file used as PUT body.
pub struct Payload {
    path: PathBuf,
    size: u64,
    content: Bytes,
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("path", &self.path)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Payload {
    /// Create a payload of `size` bytes in `dir`.
    ///
    /// Returns `Ok(None)` for a zero size: read-only runs need no payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::NegativeSize`] for a negative size and
    /// [`PayloadError::Io`] if the file cannot be written.
    pub async fn create(dir: &Path, size: i64) -> Result<Option<Self>, PayloadError> {
        let size = u64::try_from(size).map_err(|_| PayloadError::NegativeSize { size })?;
        if size == 0 {
            return Ok(None);
        }
        let path = dir.join(format!("load-test-payload-{}", uuid::Uuid::new_v4()));
        let io_err = |source| PayloadError::Io {
            path: path.clone(),
            source,
        };
        let mut file = tokio::fs::File::create(&path).await.map_err(io_err)?;
        // From here on the file exists; Drop removes it even if writing fails.
        let mut payload = Self {
            path,
            size,
            content: Bytes::new(),
        };
        let loaded = match write_random(&mut file, size).await {
            Ok(()) => tokio::fs::read(&payload.path).await,
            Err(source) => Err(source),
        };
        match loaded {
            Ok(content) => payload.content = Bytes::from(content),
            Err(source) => {
                return Err(PayloadError::Io {
                    path: payload.path.clone(),
                    source,
                });
            }
        }
        tracing::info!(
            "payload.created: path={} size={size}",
            payload.path.display()
        );
        Ok(Some(payload))
    }

    /// Location of the payload file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The first `min(len, size)` bytes. Shares the loaded buffer.
    #[must_use]
    pub fn read(&self, len: u64) -> Bytes {
        let want = usize::try_from(len).map_or(self.content.len(), |len| len.min(self.content.len()));
        self.content.slice(..want)
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("payload.removed: path={}", self.path.display()),
            Err(e) => tracing::warn!(
                "payload.remove.failed: path={} {e}",
                self.path.display()
            ),
        }
    }
}
