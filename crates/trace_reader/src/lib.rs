// Rust guideline compliant 2026-10-18

//! Trace reader component -- parses a perf trace and writes its records to a
//! [`TraceSink`] hexagonal port.
//!
//! Entry points: [`parse_line`], [`TraceReader::run`], [`TraceReader::run_file`].
//! Configuration via [`ReaderConfig::builder`].
//!
//! The reader always closes the sink when it stops, whatever the reason, so
//! that workers can tell "nothing left" from "momentarily empty".

mod follow;

use domain::{QueueError, RecordError, TraceRecord, TraceSink};
use follow::Follower;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeek, AsyncSeekExt, BufReader};

// ---------------------------------------------------------------------------
// ReaderError
// ---------------------------------------------------------------------------

/// Errors that terminate the trace reader.
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// The supplied configuration is invalid.
    #[error("invalid reader configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// The trace file could not be opened.
    #[error("cannot open trace {}: {source}", path.display())]
    Open {
        /// Path that was requested.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// Reading or seeking the trace failed mid-stream.
    #[error("trace read failed: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// ReaderConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`TraceReader`].
///
/// Construct via [`ReaderConfig::builder`].
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Non-comment lines discarded at the start of the trace.
    pub skip: u64,
    /// Stop after this many records have been handed to the sink.
    pub limit: Option<u64>,
    /// Start at end-of-file and wait for appended lines instead of stopping.
    pub tail: bool,
    /// Seek back to the start at end-of-file and keep going.
    pub rewind: bool,
    /// Substring removed (first occurrence) from every record path.
    pub strip: Option<String>,
    /// Tail-mode polling interval when change notification is unavailable.
    pub poll_interval: Duration,
}

/// Builder for [`ReaderConfig`].
#[derive(Debug)]
pub struct ReaderConfigBuilder {
    config: ReaderConfig,
}

impl ReaderConfig {
    /// Create a builder.
    ///
    /// Default values: no skip, no limit, neither tail nor rewind, no strip,
    /// `poll_interval = 100 ms`.
    #[must_use]
    pub fn builder() -> ReaderConfigBuilder {
        ReaderConfigBuilder {
            config: Self {
                skip: 0,
                limit: None,
                tail: false,
                rewind: false,
                strip: None,
                poll_interval: Duration::from_millis(100),
            },
        }
    }
}

impl ReaderConfigBuilder {
    /// Discard the first `n` non-comment lines.
    #[must_use]
    pub fn skip(mut self, n: u64) -> Self {
        self.config.skip = n;
        self
    }

    /// Stop after `n` records.
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.config.limit = Some(n);
        self
    }

    /// Follow the trace as it grows.
    #[must_use]
    pub fn tail(mut self, tail: bool) -> Self {
        self.config.tail = tail;
        self
    }

    /// Loop over the trace indefinitely.
    #[must_use]
    pub fn rewind(mut self, rewind: bool) -> Self {
        self.config.rewind = rewind;
        self
    }

    /// Remove `pattern` from each path. An empty pattern disables stripping.
    #[must_use]
    pub fn strip(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.config.strip = (!pattern.is_empty()).then_some(pattern);
        self
    }

    /// Override the tail-mode polling interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::InvalidConfig`] when tail and rewind are both
    /// set, when the limit is zero, or when the poll interval is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<ReaderConfig, ReaderError> {
        let invalid = |reason: &str| ReaderError::InvalidConfig {
            reason: reason.to_owned(),
        };
        if self.config.tail && self.config.rewind {
            return Err(invalid("tail and rewind are mutually exclusive"));
        }
        if self.config.limit == Some(0) {
            return Err(invalid("limit must be >= 1"));
        }
        if self.config.poll_interval.is_zero() {
            return Err(invalid("poll_interval must be > 0"));
        }
        Ok(self.config)
    }
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// Split a trace line into fields.
///
/// Fields are separated by runs of whitespace. A field starting with `"`
/// extends to the matching closing quote and may contain whitespace; `""`
/// inside it stands for one literal quote.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            return fields;
        };
        let mut field = String::new();
        if first == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                if c != '"' {
                    field.push(c);
                } else if chars.next_if_eq(&'"').is_some() {
                    field.push('"');
                } else {
                    break;
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                field.push(c);
            }
        }
        fields.push(field);
    }
}

/// Parse one trace line.
///
/// Returns `None` for blank lines and `#` comments, otherwise the record or
/// the reason it is malformed.
#[must_use]
pub fn parse_line(line: &str) -> Option<Result<TraceRecord, RecordError>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(TraceRecord::from_fields(split_fields(trimmed)))
}

// ---------------------------------------------------------------------------
// TraceReader
// ---------------------------------------------------------------------------

/// What happened to a record handed to the sink.
enum Pushed {
    Accepted,
    SinkClosed,
}

/// Reads trace lines and forwards well-formed records to a [`TraceSink`].
#[derive(Debug)]
pub struct TraceReader {
    config: ReaderConfig,
}

impl TraceReader {
    /// Create a reader from `config`.
    #[must_use]
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Open `path` and read it into `sink`.
    ///
    /// In tail mode the file is watched for modifications.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Open`] if the file cannot be opened and
    /// [`ReaderError::Io`] on a mid-stream failure. The sink is closed in
    /// every case.
    pub async fn run_file<S: TraceSink>(&self, path: &Path, sink: &S) -> Result<u64, ReaderError> {
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(source) => {
                sink.close();
                return Err(ReaderError::Open {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        let follower = self
            .config
            .tail
            .then(|| Follower::watching(path, self.config.poll_interval));
        Self::finish(self.pump(BufReader::new(file), sink, follower).await, sink)
    }

    /// Read `input` into `sink`; tail mode polls.
    ///
    /// Returns the number of records accepted by the sink. Stops cleanly at
    /// end of trace (unless tailing or rewinding), when the limit is reached,
    /// or when the sink reports [`QueueError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::Io`] when reading or seeking fails. The sink is
    /// closed in every case.
    pub async fn run<R, S>(&self, input: R, sink: &S) -> Result<u64, ReaderError>
    where
        R: AsyncBufRead + AsyncSeek + Unpin + Send,
        S: TraceSink,
    {
        let follower = self
            .config
            .tail
            .then(|| Follower::polling(self.config.poll_interval));
        Self::finish(self.pump(input, sink, follower).await, sink)
    }

    fn finish<S: TraceSink>(result: Result<u64, ReaderError>, sink: &S) -> Result<u64, ReaderError> {
        sink.close();
        match &result {
            Ok(count) => tracing::info!("reader.run.stopped: records={count}"),
            Err(e) => tracing::error!("reader.run.failed: {e}"),
        }
        result
    }

    async fn pump<R, S>(
        &self,
        mut input: R,
        sink: &S,
        mut follower: Option<Follower>,
    ) -> Result<u64, ReaderError>
    where
        R: AsyncBufRead + AsyncSeek + Unpin + Send,
        S: TraceSink,
    {
        if self.config.tail {
            input.seek(SeekFrom::End(0)).await?;
        }

        let mut to_skip = self.config.skip;
        let mut dispatched = 0u64;
        let mut line_no = 0u64;
        let mut pass_records = 0u64;
        let mut line = String::new();

        loop {
            let n = input.read_line(&mut line).await?;
            let at_eof = n == 0 || !line.ends_with('\n');

            // A partial last line is held back while tailing: the writer may
            // not have finished it yet.
            if at_eof && (n == 0 || follower.is_some()) {
                if let Some(follower) = follower.as_mut() {
                    follower.wait().await;
                    continue;
                }
                if !self.config.rewind {
                    return Ok(dispatched);
                }
                if pass_records == 0 {
                    tracing::warn!("reader.rewind.stopped: a full pass produced no record");
                    return Ok(dispatched);
                }
                tracing::debug!("reader.rewind: after {pass_records} record(s)");
                pass_records = 0;
                line_no = 0;
                input.seek(SeekFrom::Start(0)).await?;
                continue;
            }

            line_no += 1;
            let parsed = parse_line(&line);
            line.clear();
            let Some(parsed) = parsed else {
                continue;
            };
            if to_skip > 0 {
                to_skip -= 1;
                continue;
            }
            let mut record = match parsed {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("reader.record.skipped: line={line_no} {e}");
                    continue;
                }
            };
            pass_records += 1;

            if let Some(pattern) = &self.config.strip {
                record.path = record.path.replacen(pattern.as_str(), "", 1);
            }

            match push(sink, record).await {
                Pushed::Accepted => dispatched += 1,
                Pushed::SinkClosed => {
                    tracing::info!("reader.run.stopped: sink closed");
                    return Ok(dispatched);
                }
            }
            if self.config.limit.is_some_and(|limit| dispatched >= limit) {
                tracing::info!("reader.run.stopped: limit of {dispatched} record(s) reached");
                return Ok(dispatched);
            }
        }
    }
}

async fn push<S: TraceSink>(sink: &S, record: TraceRecord) -> Pushed {
    match sink.push(record).await {
        Ok(()) => Pushed::Accepted,
        Err(QueueError::Closed) => Pushed::SinkClosed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{ReaderConfig, ReaderError, TraceReader, parse_line, split_fields};
    use domain::{Operator, QueueError, RecordError, TraceRecord, TraceSink};
    use std::io::Cursor;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncSeek, AsyncWriteExt, BufReader, ReadBuf};

    // ------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------

    /// Sink recording every record; optionally refuses after `accept` pushes.
    struct TestSink {
        records: Mutex<Vec<TraceRecord>>,
        accept: usize,
        closed: AtomicBool,
    }

    impl TestSink {
        fn new() -> Self {
            Self::accepting(usize::MAX)
        }

        fn accepting(accept: usize) -> Self {
            Self {
                records: Mutex::new(vec![]),
                accept,
                closed: AtomicBool::new(false),
            }
        }

        fn paths(&self) -> Vec<String> {
            self.records.lock().unwrap().iter().map(|r| r.path.clone()).collect()
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl TraceSink for TestSink {
        async fn push(&self, record: TraceRecord) -> Result<(), QueueError> {
            let mut records = self.records.lock().unwrap();
            if records.len() >= self.accept {
                return Err(QueueError::Closed);
            }
            records.push(record);
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Input that yields some bytes then fails.
    struct FailingInput {
        data: Cursor<Vec<u8>>,
    }

    impl AsyncRead for FailingInput {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let before = buf.filled().len();
            match Pin::new(&mut self.data).poll_read(cx, buf) {
                Poll::Ready(Ok(())) if buf.filled().len() == before => {
                    Poll::Ready(Err(std::io::Error::other("disk on fire")))
                }
                other => other,
            }
        }
    }

    impl AsyncSeek for FailingInput {
        fn start_seek(self: Pin<&mut Self>, _position: std::io::SeekFrom) -> std::io::Result<()> {
            Ok(())
        }

        fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
            Poll::Ready(Ok(0))
        }
    }

    fn input(text: &str) -> Cursor<Vec<u8>> {
        Cursor::new(text.as_bytes().to_vec())
    }

    fn get(path: &str) -> String {
        format!("01-Mar-2017 16:00:00.000 0.01 0.0 0 512 {path} 200 GET\n")
    }

    fn reader(config: ReaderConfig) -> TraceReader {
        TraceReader::new(config)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    #[test]
    fn config_rejects_tail_with_rewind() {
        let result = ReaderConfig::builder().tail(true).rewind(true).build();
        assert!(matches!(result, Err(ReaderError::InvalidConfig { .. })));
    }

    #[test]
    fn config_rejects_zero_limit() {
        let result = ReaderConfig::builder().limit(0).build();
        assert!(matches!(result, Err(ReaderError::InvalidConfig { .. })));
    }

    #[test]
    fn empty_strip_disables_stripping() {
        let config = ReaderConfig::builder().strip("").build().unwrap();
        assert_eq!(config.strip, None);
    }

    // ------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------

    #[test]
    fn comments_and_blank_lines_ignored() {
        assert!(parse_line("#yyyy-mm-dd hh:mm:ss latency").is_none());
        assert!(parse_line("   # indented comment").is_none());
        assert!(parse_line("  \t \n").is_none());
    }

    #[test]
    fn short_line_is_malformed() {
        let result = parse_line("a b c d e").unwrap();
        assert_eq!(result, Err(RecordError::TooFewFields { found: 5 }));
    }

    #[test]
    fn quoted_body_keeps_whitespace() {
        let line = r#"d t 0 0 0 20 /form 200 POST "name=a b ""quoted""""#;
        let record = parse_line(line).unwrap().unwrap();
        assert_eq!(record.operator, Operator::Post);
        assert_eq!(record.body.as_deref(), Some(r#"name=a b "quoted""#));
    }

    #[test]
    fn split_handles_tabs_and_runs_of_spaces() {
        assert_eq!(split_fields(" a\t\tb   c "), vec!["a", "b", "c"]);
        assert_eq!(split_fields(r#""""#), vec![""]);
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn reads_all_records_in_order_and_closes() {
        let text = format!("#header\n{}{}\n{}", get("/a"), get("/b"), get("/c"));
        let sink = TestSink::new();
        let n = reader(ReaderConfig::builder().build().unwrap())
            .run(input(&text), &sink)
            .await
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(sink.paths(), ["/a", "/b", "/c"]);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn malformed_line_skipped_and_next_dispatched() {
        let text = format!("a b c d e\n{}", get("/ok"));
        let sink = TestSink::new();
        let n = reader(ReaderConfig::builder().build().unwrap())
            .run(input(&text), &sink)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(sink.paths(), ["/ok"]);
    }

    #[tokio::test]
    async fn last_line_without_newline_is_read() {
        let text = format!("{}{}", get("/a"), get("/b").trim_end());
        let sink = TestSink::new();
        reader(ReaderConfig::builder().build().unwrap())
            .run(input(&text), &sink)
            .await
            .unwrap();
        assert_eq!(sink.paths(), ["/a", "/b"]);
    }

    #[tokio::test]
    async fn skip_and_limit() {
        let text: String = ["/1", "/2", "/3", "/4", "/5"].iter().map(|p| get(p)).collect();
        let sink = TestSink::new();
        let config = ReaderConfig::builder().skip(1).limit(2).build().unwrap();
        let n = reader(config).run(input(&text), &sink).await.unwrap();
        assert_eq!(n, 2);
        assert_eq!(sink.paths(), ["/2", "/3"]);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn strip_removes_first_occurrence_only() {
        let sink = TestSink::new();
        let config = ReaderConfig::builder().strip("/cdn").build().unwrap();
        reader(config)
            .run(input(&get("/cdn/img/cdn/x.png")), &sink)
            .await
            .unwrap();
        assert_eq!(sink.paths(), ["/img/cdn/x.png"]);
    }

    #[tokio::test]
    async fn rewind_loops_without_repeating_skip() {
        let text = format!("#c\n{}{}{}", get("/a"), get("/b"), get("/c"));
        let sink = TestSink::new();
        let config = ReaderConfig::builder()
            .rewind(true)
            .skip(1)
            .limit(6)
            .build()
            .unwrap();
        reader(config).run(input(&text), &sink).await.unwrap();
        assert_eq!(sink.paths(), ["/b", "/c", "/a", "/b", "/c", "/a"]);
    }

    #[tokio::test]
    async fn rewind_over_recordless_trace_stops() {
        let sink = TestSink::new();
        let config = ReaderConfig::builder().rewind(true).build().unwrap();
        let n = reader(config)
            .run(input("# only a comment\nshort line\n"), &sink)
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn closed_sink_stops_reader_cleanly() {
        let text: String = ["/1", "/2", "/3"].iter().map(|p| get(p)).collect();
        let sink = TestSink::accepting(1);
        let n = reader(ReaderConfig::builder().build().unwrap())
            .run(input(&text), &sink)
            .await
            .unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn io_error_is_fatal_and_closes_sink() {
        let failing = BufReader::new(FailingInput {
            data: input(&get("/before")),
        });
        let sink = TestSink::new();
        let result = reader(ReaderConfig::builder().build().unwrap())
            .run(failing, &sink)
            .await;
        assert!(matches!(result, Err(ReaderError::Io(_))), "{result:?}");
        assert_eq!(sink.paths(), ["/before"]);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn missing_file_reports_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TestSink::new();
        let result = reader(ReaderConfig::builder().build().unwrap())
            .run_file(&dir.path().join("nope.perf"), &sink)
            .await;
        assert!(matches!(result, Err(ReaderError::Open { .. })));
        assert!(sink.is_closed());
    }

    // ------------------------------------------------------------------
    // Tail mode
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn tail_ignores_existing_lines_and_follows_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.perf");
        tokio::fs::write(&path, get("/old")).await.unwrap();

        let config = ReaderConfig::builder()
            .tail(true)
            .limit(2)
            .poll_interval(Duration::from_millis(10))
            .build()
            .unwrap();
        let sink = TestSink::new();
        let tail_reader = reader(config);
        let reading = tail_reader.run_file(&path, &sink);

        let writing = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .open(&path)
                .await
                .unwrap();
            // Written in two pieces: the first half must not be parsed alone.
            let line = get("/new1");
            let (head, rest) = line.split_at(10);
            file.write_all(head.as_bytes()).await.unwrap();
            file.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            file.write_all(rest.as_bytes()).await.unwrap();
            file.write_all(get("/new2").as_bytes()).await.unwrap();
            file.flush().await.unwrap();
        };

        let (n, ()) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(reading, writing)
        })
        .await
        .unwrap();
        assert_eq!(n.unwrap(), 2);
        assert_eq!(sink.paths(), ["/new1", "/new2"]);
    }
}
