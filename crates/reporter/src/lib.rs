// Rust guideline compliant 2026-10-18

//! Reporter crate: turns engine [`Event`]s into the line-oriented
//! performance stream.
//!
//! Entry points: [`Reporter::write_header`], [`Reporter::report`],
//! [`format_record`].
//!
//! Record order follows completion order, which differs from trace order.

use chrono::{DateTime, Local};
use domain::{Event, PerfRecord};
use std::io::Write;
use std::time::SystemTime;

/// First line of every performance stream.
pub const HEADER: &str =
    "#yyyy-mm-dd hh:mm:ss.sss latency xfertime sleeptime bytes path rc op rate expected";

// ---------------------------------------------------------------------------
// ReporterError
// ---------------------------------------------------------------------------

/// Errors that can occur while writing the performance stream.
#[derive(Debug, thiserror::Error)]
pub enum ReporterError {
    /// The output stream rejected a write or flush.
    #[error("performance stream write failed: {0}")]
    Write(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Local wall-clock time with millisecond precision.
#[must_use]
pub fn format_timestamp(at: SystemTime) -> String {
    DateTime::<Local>::from(at)
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

/// One performance line, without the trailing newline.
///
/// Sleep time is always `0`; the annotation is present only when the trace
/// expected a different result code.
#[must_use]
pub fn format_record(record: &PerfRecord) -> String {
    let m = &record.measurement;
    let mut line = format!(
        "{} {:.6} {:.6} 0 {} {} {} {} {}",
        format_timestamp(m.started),
        m.latency.as_secs_f64(),
        m.transfer_time.as_secs_f64(),
        m.bytes,
        m.path,
        m.status,
        m.operator,
        record.offered_rate,
    );
    if let Some(expected) = record.mismatch() {
        line.push_str(&format!(" expectedRC={expected}"));
    }
    line
}

/// Comment line announcing a new offered rate.
#[must_use]
pub fn format_rate_change(rate: usize) -> String {
    format!("#request/second = {rate}")
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Writes the performance stream to `W`, flushing after every event so that
/// a tailing consumer sees lines as they happen.
#[derive(Debug)]
pub struct Reporter<W: Write> {
    out: W,
    records: u64,
    mismatches: u64,
    last_rate: usize,
}

impl<W: Write> Reporter<W> {
    /// Create a reporter writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            records: 0,
            mismatches: 0,
            last_rate: 0,
        }
    }

    /// Write [`HEADER`].
    ///
    /// # Errors
    ///
    /// Returns [`ReporterError::Write`] if the stream fails.
    pub fn write_header(&mut self) -> Result<(), ReporterError> {
        writeln!(self.out, "{HEADER}")?;
        self.out.flush()?;
        Ok(())
    }

    /// Write the line(s) for one event.
    ///
    /// # Errors
    ///
    /// Returns [`ReporterError::Write`] if the stream fails.
    pub fn report(&mut self, event: &Event) -> Result<(), ReporterError> {
        match event {
            Event::Performance(record) => {
                writeln!(self.out, "{}", format_record(record))?;
                self.records += 1;
                if record.mismatch().is_some() {
                    self.mismatches += 1;
                }
            }
            Event::RateChanged(rate) => {
                writeln!(self.out, "{}", format_rate_change(*rate))?;
                self.last_rate = *rate;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    /// Performance records written so far.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Records whose result code differed from the trace.
    #[must_use]
    pub fn mismatches(&self) -> u64 {
        self.mismatches
    }

    /// Last announced offered rate (0 before the first announcement).
    #[must_use]
    pub fn last_rate(&self) -> usize {
        self.last_rate
    }

    /// Recover the output stream.
    pub fn into_inner(self) -> W {
        tracing::debug!(
            "reporter.closed: records={} mismatches={}",
            self.records,
            self.mismatches
        );
        self.out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
