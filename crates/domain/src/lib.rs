// Rust guideline compliant 2026-10-18

//! Shared domain types for the trace-replay load generator.
//!
//! Defines `TraceRecord`, `Operator`, `Measurement`, `PerfRecord`, `Event`,
//! the error enums, and the hexagonal port traits: `TraceSink`, `TraceSource`,
//! `Operation`, and `EventSink`. All engine crates depend on this crate.

use std::fmt;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// Minimum number of fields in a well-formed trace line.
pub const MIN_FIELDS: usize = 9;

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// Direction of an operator, checked against the read/write enablement flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// GET and POST.
    Read,
    /// PUT.
    Write,
}

/// Operator column of a trace record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    /// Fetch an object.
    Get,
    /// Store `bytes` of payload at the path.
    Put,
    /// Send the record's body to the path.
    Post,
    /// Anything else found in the trace (e.g. `DELETE`, `HEAD`); never dispatched.
    Other(String),
}

impl Operator {
    /// Parse the operator column. Matching is case-sensitive, as in the trace format.
    #[must_use]
    pub fn parse(field: &str) -> Self {
        match field {
            "GET" => Self::Get,
            "PUT" => Self::Put,
            "POST" => Self::Post,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Canonical spelling used in output lines.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Other(name) => name,
        }
    }

    /// `None` for operators the engine does not implement.
    #[must_use]
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Get | Self::Post => Some(Direction::Read),
            Self::Put => Some(Direction::Write),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TraceRecord
// ---------------------------------------------------------------------------

/// Why a trace line could not become a [`TraceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Fewer than [`MIN_FIELDS`] fields.
    #[error("expected at least {MIN_FIELDS} fields, found {found}")]
    TooFewFields {
        /// Number of fields actually present.
        found: usize,
    },
    /// A POST record without the trailing body field.
    #[error("POST record has no body field")]
    MissingBody,
    /// The bytes column of a PUT record is not an integer.
    #[error("size field {value:?} is not an integer")]
    BadSize {
        /// Offending column content.
        value: String,
    },
}

/// One operation of a perf trace.
///
/// Columns are kept verbatim except `operator`; the timing columns are
/// informational and never interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// Date the operation was recorded.
    pub date: String,
    /// Time of day the operation was recorded.
    pub time: String,
    /// Recorded latency.
    pub latency: String,
    /// Recorded transfer time.
    pub transfer_time: String,
    /// Recorded sleep (think) time.
    pub sleep_time: String,
    /// Byte count; the payload size for PUT.
    pub bytes: String,
    /// Target path, relative to the protocol's base.
    pub path: String,
    /// Result code observed when the trace was recorded.
    pub return_code: String,
    /// Operation to perform.
    pub operator: Operator,
    /// Request body; present for every POST record.
    pub body: Option<String>,
}

impl TraceRecord {
    /// Build a record from the already-split columns of one trace line.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::TooFewFields`] below [`MIN_FIELDS`] columns,
    /// [`RecordError::MissingBody`] for a POST without a body, and
    /// [`RecordError::BadSize`] for a PUT whose size is not an integer.
    pub fn from_fields(fields: Vec<String>) -> Result<Self, RecordError> {
        if fields.len() < MIN_FIELDS {
            return Err(RecordError::TooFewFields { found: fields.len() });
        }
        let mut columns = fields.into_iter();
        // Length checked above: the first nine `next()` calls always yield.
        let mut next = || columns.next().unwrap_or_default();
        let record = Self {
            date: next(),
            time: next(),
            latency: next(),
            transfer_time: next(),
            sleep_time: next(),
            bytes: next(),
            path: next(),
            return_code: next(),
            operator: Operator::parse(&next()),
            body: columns.next(),
        };
        match record.operator {
            Operator::Post if record.body.is_none() => Err(RecordError::MissingBody),
            Operator::Put if record.size().is_err() => Err(RecordError::BadSize {
                value: record.bytes.clone(),
            }),
            _ => Ok(record),
        }
    }

    /// Parse the bytes column.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::BadSize`] if the column is not an integer.
    pub fn size(&self) -> Result<i64, RecordError> {
        self.bytes.parse().map_err(|_| RecordError::BadSize { value: self.bytes.clone() })
    }

    /// Result code the trace expects, if it is a usable non-zero integer.
    #[must_use]
    pub fn expected_code(&self) -> Option<i32> {
        self.return_code.parse().ok().filter(|&code| code != 0)
    }
}

// ---------------------------------------------------------------------------
// Measurement / PerfRecord / Event
// ---------------------------------------------------------------------------

/// Outcome of one operation as measured by a protocol adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    /// Wall-clock time the request started.
    pub started: SystemTime,
    /// Time until the response (headers) arrived.
    pub latency: Duration,
    /// Time spent reading the response body after `latency`.
    pub transfer_time: Duration,
    /// Bytes transferred (body read for GET, payload sent for PUT/POST).
    pub bytes: u64,
    /// Path as dispatched.
    pub path: String,
    /// Observed result code, or a negative sentinel when none was obtained.
    pub status: i32,
    /// Operator that produced this measurement.
    pub operator: Operator,
    /// `true` when the adapter considers the outcome an error.
    pub failed: bool,
}

impl Measurement {
    /// A measurement for an operation that never reached the target.
    #[must_use]
    pub fn rejected(path: &str, operator: Operator, status: i32) -> Self {
        Self {
            started: SystemTime::now(),
            latency: Duration::ZERO,
            transfer_time: Duration::ZERO,
            bytes: 0,
            path: path.to_owned(),
            status,
            operator,
            failed: true,
        }
    }
}

/// A completed operation, annotated for the performance stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfRecord {
    /// What the adapter observed.
    pub measurement: Measurement,
    /// Offered rate at the time the operation completed.
    pub offered_rate: usize,
    /// Result code recorded in the trace, if any.
    pub expected: Option<i32>,
}

impl PerfRecord {
    /// The expected code when it differs from the observed one.
    #[must_use]
    pub fn mismatch(&self) -> Option<i32> {
        self.expected.filter(|&code| code != self.measurement.status)
    }
}

/// Everything that flows from the engine to the performance stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One operation completed.
    Performance(PerfRecord),
    /// The scheduler changed the number of workers.
    RateChanged(usize),
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that a work queue implementation may return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue is closed; writers are rejected and readers find it drained.
    #[error("queue closed")]
    Closed,
}

/// Errors from the Operation hexagonal port.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// One-time protocol setup failed.
    #[error("operation setup failed: {reason}")]
    Setup {
        /// Human-readable description.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Hexagonal port: the write side of the work queue.
///
/// The trace reader depends exclusively on this trait.
pub trait TraceSink: Send + Sync {
    /// Append a record, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the queue has been closed.
    fn push(&self, record: TraceRecord) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Signal end-of-data. Must be idempotent.
    fn close(&self);
}

/// Hexagonal port: the read side of the work queue.
///
/// Each record is handed to exactly one caller of [`pop`](Self::pop).
pub trait TraceSource: Send + Sync {
    /// Take the oldest record, waiting while the queue is open but empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] when the queue is closed and drained.
    fn pop(&self) -> impl Future<Output = Result<TraceRecord, QueueError>> + Send;

    /// Records currently waiting.
    fn len(&self) -> usize;

    /// `true` when no record is waiting.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once the writer has closed the queue.
    fn is_closed(&self) -> bool;
}

/// Hexagonal port: one protocol backend.
///
/// Data operations never fail towards the caller: every outcome, including
/// transport errors, comes back as a [`Measurement`].
pub trait Operation: Send + Sync {
    /// Short protocol name for logs.
    fn name(&self) -> &str;

    /// One-time setup before any worker starts.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Setup`] when the backend cannot be used.
    fn init(&self) -> impl Future<Output = Result<(), OperationError>> + Send;

    /// Fetch `path`.
    fn get(&self, path: &str, expected: Option<i32>) -> impl Future<Output = Measurement> + Send;

    /// Store `size` bytes of payload at `path`.
    fn put(
        &self,
        path: &str,
        size: i64,
        expected: Option<i32>,
    ) -> impl Future<Output = Measurement> + Send;

    /// Send `body` to `path`.
    fn post(
        &self,
        path: &str,
        size: i64,
        expected: Option<i32>,
        body: &str,
    ) -> impl Future<Output = Measurement> + Send;
}

/// Hexagonal port: unordered, multi-producer destination of [`Event`]s.
pub trait EventSink: Send + Sync {
    /// Deliver one event; never blocks.
    fn emit(&self, event: Event);
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<Event> {
    fn emit(&self, event: Event) {
        // A dropped receiver means the run is over; late events are discarded.
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn nine_field_get_parses() {
        let record =
            TraceRecord::from_fields(fields("01-Mar-2017 16:00:00 0 0 0 0 /a/b 404 GET")).unwrap();
        assert_eq!(record.path, "/a/b");
        assert_eq!(record.operator, Operator::Get);
        assert_eq!(record.expected_code(), Some(404));
        assert_eq!(record.body, None);
    }

    #[test]
    fn too_few_fields_rejected() {
        let result = TraceRecord::from_fields(fields("a b c d e"));
        assert_eq!(result, Err(RecordError::TooFewFields { found: 5 }));
    }

    #[test]
    fn post_requires_body() {
        let result = TraceRecord::from_fields(fields("d t 0 0 0 12 /form 200 POST"));
        assert_eq!(result, Err(RecordError::MissingBody));

        let record = TraceRecord::from_fields(fields("d t 0 0 0 12 /form 200 POST x=1")).unwrap();
        assert_eq!(record.body.as_deref(), Some("x=1"));
    }

    #[test]
    fn put_requires_integer_size() {
        let result = TraceRecord::from_fields(fields("d t 0 0 0 big /obj 201 PUT"));
        assert!(matches!(result, Err(RecordError::BadSize { .. })));

        let record = TraceRecord::from_fields(fields("d t 0 0 0 4096 /obj 201 PUT")).unwrap();
        assert_eq!(record.size(), Ok(4096));
    }

    #[test]
    fn unknown_operator_kept_without_direction() {
        let record = TraceRecord::from_fields(fields("d t 0 0 0 0 /x 204 DELETE")).unwrap();
        assert_eq!(record.operator, Operator::Other("DELETE".to_owned()));
        assert_eq!(record.operator.direction(), None);
        assert_eq!(record.operator.to_string(), "DELETE");
    }

    #[test]
    fn directions() {
        assert_eq!(Operator::Get.direction(), Some(Direction::Read));
        assert_eq!(Operator::Post.direction(), Some(Direction::Read));
        assert_eq!(Operator::Put.direction(), Some(Direction::Write));
    }

    #[test]
    fn zero_or_garbage_expected_code_is_none() {
        let mut record = TraceRecord::from_fields(fields("d t 0 0 0 0 /x 0 GET")).unwrap();
        assert_eq!(record.expected_code(), None);
        record.return_code = "4XX".to_owned();
        assert_eq!(record.expected_code(), None);
    }

    #[test]
    fn mismatch_only_when_codes_differ() {
        let mut perf = PerfRecord {
            measurement: Measurement::rejected("/x", Operator::Get, 200),
            offered_rate: 3,
            expected: Some(200),
        };
        assert_eq!(perf.mismatch(), None);
        perf.expected = Some(404);
        assert_eq!(perf.mismatch(), Some(404));
        perf.expected = None;
        assert_eq!(perf.mismatch(), None);
    }

    #[test]
    fn rejected_measurement_is_failed_and_untimed() {
        let m = Measurement::rejected("/p", Operator::Put, 411);
        assert!(m.failed);
        assert_eq!(m.latency, Duration::ZERO);
        assert_eq!(m.status, 411);
    }

    #[test]
    fn queue_error_display() {
        assert_eq!(QueueError::Closed.to_string(), "queue closed");
        let e = OperationError::Setup { reason: "no bucket".to_owned() };
        assert_eq!(e.to_string(), "operation setup failed: no bucket");
    }

    #[tokio::test]
    async fn channel_sink_delivers_and_tolerates_closed_receiver() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.emit(Event::RateChanged(4));
        assert_eq!(rx.recv().await, Some(Event::RateChanged(4)));

        drop(rx);
        tx.emit(Event::RateChanged(5)); // must not panic
    }
}
