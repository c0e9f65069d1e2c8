// Rust guideline compliant 2026-10-18

//! Object-store credentials file.
//!
//! One `NAME value` pair per line, `#` comments and blank lines ignored.
//! Recognised names: `S3_ACCESS_KEY`, `S3_SECRET_KEY`. Secrets never reach
//! the logs.

use std::fmt;
use std::path::{Path, PathBuf};

const ACCESS_KEY: &str = "S3_ACCESS_KEY";
const SECRET_KEY: &str = "S3_SECRET_KEY";

/// Errors from loading a credentials file.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// The file could not be read.
    #[error("cannot read credentials {}: {source}", path.display())]
    Io {
        /// File requested.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// A line is not a `NAME value` pair.
    #[error("credentials line {line} is not a NAME value pair")]
    Malformed {
        /// 1-based line number.
        line: usize,
    },
    /// A required name is absent.
    #[error("credentials file has no {name}")]
    Missing {
        /// The absent name.
        name: &'static str,
    },
}

/// Static access key pair for an S3-compatible store.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl S3Credentials {
    /// Parse the text of a credentials file.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Malformed`] for a line without a value and
    /// [`CredentialsError::Missing`] when either key is absent.
    pub fn parse(text: &str) -> Result<Self, CredentialsError> {
        let mut access_key = None;
        let mut secret_key = None;
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, value)) = line.split_once(char::is_whitespace) else {
                return Err(CredentialsError::Malformed { line: index + 1 });
            };
            let value = value.trim().to_owned();
            match name {
                ACCESS_KEY => access_key = Some(value),
                SECRET_KEY => secret_key = Some(value),
                other => tracing::debug!("credentials.ignored: name={other}"),
            }
        }
        Ok(Self {
            access_key: access_key.ok_or(CredentialsError::Missing { name: ACCESS_KEY })?,
            secret_key: secret_key.ok_or(CredentialsError::Missing { name: SECRET_KEY })?,
        })
    }

    /// Read and parse the credentials file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Io`] if the file cannot be read, otherwise
    /// as [`parse`](Self::parse).
    pub async fn load(path: &Path) -> Result<Self, CredentialsError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialsError::Io {
                path: path.to_owned(),
                source,
            })?;
        let credentials = Self::parse(&text)?;
        tracing::info!(
            "credentials.loaded: path={} access_key={}",
            path.display(),
            credentials.access_key
        );
        Ok(credentials)
    }
}
