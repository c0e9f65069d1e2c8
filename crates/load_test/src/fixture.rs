// Rust guideline compliant 2026-10-18

//! Fixture creation: pre-create the objects a read-only trace expects.
//!
//! A GET whose recorded status implies the object existed gets a file of the
//! recorded size; a DELETE gets a 1-byte file so it has something to remove.
//! PUT, POST and the bare `/` path are left alone.

use crate::adapters::filesystem::FilesystemOperation;
use crate::http_codes::should_exist;
use domain::{Operator, TraceRecord};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Errors from fixture creation.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// The trace could not be opened.
    #[error("cannot open trace {}: {source}", path.display())]
    Open {
        /// Trace requested.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// Reading the trace failed part-way.
    #[error("trace read failed: {0}")]
    Read(#[source] std::io::Error),
    /// A fixture file could not be written.
    #[error("cannot create {path}: {source}")]
    Create {
        /// Trace path of the object.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Which part of the trace to use and how big to make the files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureOptions {
    /// Records to skip before starting.
    pub skip: u64,
    /// Records to consider after skipping; `None` reads to the end.
    pub limit: Option<u64>,
    /// Create every file empty instead of at its recorded size.
    pub zero: bool,
}

/// Counts from one fixture pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixtureSummary {
    /// Files written.
    pub created: u64,
    /// Records considered but not needing a file.
    pub ignored: u64,
}

/// Size of the file a record needs, or `None` if it needs none.
fn fixture_size(record: &TraceRecord, zero: bool) -> Option<u64> {
    if record.path == "/" {
        return None;
    }
    let recorded = || {
        if zero {
            0
        } else {
            record.size().ok().and_then(|size| u64::try_from(size).ok()).unwrap_or(0)
        }
    };
    match &record.operator {
        Operator::Get => record
            .expected_code()
            .is_some_and(should_exist)
            .then(recorded),
        Operator::Other(op) if op == "DELETE" || op == "DELE" => Some(1),
        Operator::Other(op) if op.is_empty() => record
            .expected_code()
            .is_some_and(should_exist)
            .then(recorded),
        Operator::Put | Operator::Post | Operator::Other(_) => None,
    }
}

/// Replay `trace` into `target`, creating the files its records need.
///
/// # Errors
///
/// Returns [`FixtureError::Open`] or [`FixtureError::Read`] for trace I/O
/// failures and [`FixtureError::Create`] for the first file that could not
/// be written.
pub async fn create_fixtures(
    trace: &Path,
    target: &FilesystemOperation,
    options: FixtureOptions,
) -> Result<FixtureSummary, FixtureError> {
    let file = tokio::fs::File::open(trace)
        .await
        .map_err(|source| FixtureError::Open {
            path: trace.to_owned(),
            source,
        })?;
    let mut lines = BufReader::new(file).lines();
    let mut summary = FixtureSummary::default();
    let mut skipped = 0;
    let mut used = 0;

    while let Some(line) = lines.next_line().await.map_err(FixtureError::Read)? {
        let record = match trace_reader::parse_line(&line) {
            None => continue,
            Some(Err(e)) => {
                tracing::warn!("fixture.record.skipped: {e}: {line:?}");
                continue;
            }
            Some(Ok(record)) => record,
        };
        if skipped < options.skip {
            skipped += 1;
            continue;
        }
        if options.limit.is_some_and(|limit| used >= limit) {
            break;
        }
        used += 1;

        let Some(size) = fixture_size(&record, options.zero) else {
            tracing::debug!("fixture.record.ignored: {} {}", record.operator, record.path);
            summary.ignored += 1;
            continue;
        };
        target
            .create_file(&record.path, size)
            .await
            .map_err(|source| FixtureError::Create {
                path: record.path.clone(),
                source,
            })?;
        tracing::debug!("fixture.created: path={} size={size}", record.path);
        summary.created += 1;
    }

    tracing::info!(
        "fixture.done: created={} ignored={}",
        summary.created,
        summary.ignored
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{FixtureOptions, FixtureSummary, create_fixtures, fixture_size};
    use domain::TraceRecord;
    use crate::adapters::filesystem::FilesystemOperation;
    use std::path::Path;

    const TRACE: &str = "\
# sample
01-Mar-2017 16:00:00 0 0 0 700 /img/a.jpg 200 GET
01-Mar-2017 16:00:01 0 0 0 0 /img/gone.jpg 404 GET
01-Mar-2017 16:00:02 0 0 0 50 /doc/b.txt 206 GET
01-Mar-2017 16:00:03 0 0 0 0 /old/c 204 DELETE
01-Mar-2017 16:00:04 0 0 0 10 /up/d 201 PUT
01-Mar-2017 16:00:05 0 0 0 0 / 200 GET
short line
";

    fn write_trace(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("trace.log");
        std::fs::write(&path, TRACE).unwrap();
        path
    }

    fn size(root: &Path, path: &str) -> Option<u64> {
        std::fs::metadata(root.join(path)).ok().map(|m| m.len())
    }

    #[tokio::test]
    async fn creates_files_gets_expect() {
        let dir = tempfile::tempdir().unwrap();
        let trace = write_trace(dir.path());
        let root = dir.path().join("root");

        let summary = create_fixtures(&trace, &FilesystemOperation::new(&root), FixtureOptions::default())
            .await
            .unwrap();

        assert_eq!(summary, FixtureSummary { created: 3, ignored: 3 });
        assert_eq!(size(&root, "img/a.jpg"), Some(700));
        assert_eq!(size(&root, "doc/b.txt"), Some(50));
        assert_eq!(size(&root, "old/c"), Some(1));
        assert_eq!(size(&root, "img/gone.jpg"), None);
        assert_eq!(size(&root, "up/d"), None);
    }

    #[tokio::test]
    async fn zero_mode_and_window() {
        let dir = tempfile::tempdir().unwrap();
        let trace = write_trace(dir.path());
        let root = dir.path().join("root");
        let options = FixtureOptions {
            skip: 2,
            limit: Some(1),
            zero: true,
        };

        let summary = create_fixtures(&trace, &FilesystemOperation::new(&root), options)
            .await
            .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(size(&root, "doc/b.txt"), Some(0));
        assert_eq!(size(&root, "img/a.jpg"), None);
    }

    fn record(bytes: &str, path: &str, code: &str, operator: &str) -> TraceRecord {
        let fields = ["01-Mar-2017", "16:00:00", "0", "0", "0", bytes, path, code, operator];
        TraceRecord::from_fields(fields.iter().map(|&f| f.to_owned()).collect()).unwrap()
    }

    #[test]
    fn empty_operator_is_treated_as_get() {
        assert_eq!(fixture_size(&record("300", "/a", "200", ""), false), Some(300));
        assert_eq!(fixture_size(&record("300", "/a", "200", ""), true), Some(0));
        assert_eq!(fixture_size(&record("300", "/a", "404", ""), false), None);
        assert_eq!(fixture_size(&record("300", "/a", "200", "HEAD"), false), None);
    }

    #[tokio::test]
    async fn missing_trace_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = create_fixtures(
            &dir.path().join("nope"),
            &FilesystemOperation::new(dir.path()),
            FixtureOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(super::FixtureError::Open { .. })));
    }
}
