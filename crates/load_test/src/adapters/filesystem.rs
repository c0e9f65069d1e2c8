// Rust guideline compliant 2026-10-18

//! `Operation` adapter over a local directory tree.
//!
//! Trace paths are resolved below a root directory. GET reads the whole
//! file, PUT creates it with random content, POST writes the record body.

use crate::payload::write_random;
use domain::{Measurement, Operation, OperationError, Operator};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

/// Local filesystem protocol rooted at a directory.
#[derive(Debug)]
pub struct FilesystemOperation {
    root: PathBuf,
}

impl FilesystemOperation {
    /// Serve paths below `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a trace path onto the root. `None` if it would escape the root.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            .then(|| self.root.join(relative))
    }

    /// Create `path` below the root with `size` random bytes.
    ///
    /// Used both by PUT and by fixture creation.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if a directory or the file cannot be written,
    /// or `InvalidInput` for a path outside the root.
    pub async fn create_file(&self, path: &str, size: u64) -> std::io::Result<PathBuf> {
        let full = self.resolve(path).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{path} escapes the root"))
        })?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&full).await?;
        write_random(&mut file, size).await?;
        Ok(full)
    }

    async fn write_body(&self, full: &Path, body: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(full).await?;
        file.write_all(body).await?;
        file.flush().await
    }
}

/// Build a measurement for a finished local call.
fn measured(started: SystemTime, initial: Instant, path: &str, operator: Operator, bytes: u64, status: i32) -> Measurement {
    Measurement {
        started,
        latency: initial.elapsed(),
        transfer_time: Duration::ZERO,
        bytes,
        path: path.to_owned(),
        status,
        operator,
        failed: !(200..300).contains(&status) && status != 404,
    }
}

impl Operation for FilesystemOperation {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn init(&self) -> Result<(), OperationError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| OperationError::Setup {
                reason: format!("cannot create root {}: {e}", self.root.display()),
            })?;
        tracing::info!("filesystem.init: root={}", self.root.display());
        Ok(())
    }

    async fn get(&self, path: &str, _expected: Option<i32>) -> Measurement {
        let Some(full) = self.resolve(path) else {
            tracing::warn!("filesystem.get.rejected: {path} escapes the root");
            return Measurement::rejected(path, Operator::Get, 400);
        };
        let started = SystemTime::now();
        let initial = Instant::now();
        match tokio::fs::read(&full).await {
            Ok(content) => measured(started, initial, path, Operator::Get, content.len() as u64, 200),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                measured(started, initial, path, Operator::Get, 0, 404)
            }
            Err(e) => {
                tracing::warn!("filesystem.get.failed: path={path} {e}");
                measured(started, initial, path, Operator::Get, 0, -1)
            }
        }
    }

    async fn put(&self, path: &str, size: i64, _expected: Option<i32>) -> Measurement {
        let Ok(size) = u64::try_from(size) else {
            let mut m = Measurement::rejected(path, Operator::Put, 411);
            m.failed = false;
            return m;
        };
        let started = SystemTime::now();
        let initial = Instant::now();
        match self.create_file(path, size).await {
            Ok(_) => measured(started, initial, path, Operator::Put, size, 201),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
                tracing::warn!("filesystem.put.rejected: {e}");
                Measurement::rejected(path, Operator::Put, 400)
            }
            Err(e) => {
                tracing::warn!("filesystem.put.failed: path={path} {e}");
                measured(started, initial, path, Operator::Put, 0, -1)
            }
        }
    }

    async fn post(&self, path: &str, _size: i64, _expected: Option<i32>, body: &str) -> Measurement {
        let Some(full) = self.resolve(path) else {
            tracing::warn!("filesystem.post.rejected: {path} escapes the root");
            return Measurement::rejected(path, Operator::Post, 400);
        };
        let started = SystemTime::now();
        let initial = Instant::now();
        match self.write_body(&full, body.as_bytes()).await {
            Ok(()) => measured(started, initial, path, Operator::Post, body.len() as u64, 201),
            Err(e) => {
                tracing::warn!("filesystem.post.failed: path={path} {e}");
                measured(started, initial, path, Operator::Post, 0, -1)
            }
        }
    }
}
