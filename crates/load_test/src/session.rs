// Rust guideline compliant 2026-10-18

//! Session driver: wires reader, work queue, scheduler and reporter for one
//! run and decides when the run is over.
//!
//! The run ends when the scheduler completes its profile, when the shutdown
//! signal is closed from outside, or when no event arrives within the idle
//! timeout. After a normal close the session keeps reporting for the drain
//! interval so in-flight operations still produce their lines; an idle
//! timeout ends the run at once.

use crate::adapters::work_queue::{DEFAULT_CAPACITY, WorkQueue};
use domain::{Event, Operation, OperationError, TraceSink as _};
use reporter::{Reporter, ReporterError};
use scheduler::{LoadConfig, Scheduler, SchedulerError, Shutdown, ShutdownReason};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::{Instant, sleep};
use trace_reader::{ReaderConfig, ReaderError, TraceReader};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A configuration value is out of range.
    #[error("invalid session config: {reason}")]
    InvalidConfig {
        /// Human-readable description of the violated constraint.
        reason: String,
    },
    /// The protocol backend refused to start.
    #[error(transparent)]
    Setup(#[from] OperationError),
    /// The trace could not be read.
    #[error(transparent)]
    Reader(#[from] ReaderError),
    /// The scheduler stopped on an error.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// The performance stream could not be written.
    #[error(transparent)]
    Report(#[from] ReporterError),
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Run-level timers and queue sizing.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Longest gap between events before the run is ended.
    pub idle_timeout: Duration,
    /// How long events are still reported after shutdown.
    pub drain: Duration,
    /// Work-queue capacity.
    pub queue_capacity: usize,
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    idle_timeout: Duration,
    drain: Duration,
    queue_capacity: usize,
}

impl SessionConfig {
    /// Defaults: 35 s idle timeout, 10 s drain, queue of 100 records.
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            idle_timeout: Duration::from_secs(35),
            drain: Duration::from_secs(10),
            queue_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl SessionConfigBuilder {
    /// Set the idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the drain interval. Zero ends the run as soon as shutdown closes.
    #[must_use]
    pub fn drain(mut self, drain: Duration) -> Self {
        self.drain = drain;
        self
    }

    /// Set the work-queue capacity.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] for a zero idle timeout or a
    /// zero queue capacity.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<SessionConfig, SessionError> {
        if self.idle_timeout.is_zero() {
            return Err(SessionError::InvalidConfig {
                reason: "idle timeout must be > 0".into(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(SessionError::InvalidConfig {
                reason: "queue capacity must be >= 1".into(),
            });
        }
        Ok(SessionConfig {
            idle_timeout: self.idle_timeout,
            drain: self.drain,
            queue_capacity: self.queue_capacity,
        })
    }
}

// ---------------------------------------------------------------------------
// LoadSession
// ---------------------------------------------------------------------------

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Performance records written.
    pub records: u64,
    /// Records whose status differed from the trace's.
    pub mismatches: u64,
    /// Operations dispatched by the scheduler, if it ran to the end.
    pub dispatched: Option<u64>,
    /// Why the run stopped.
    pub reason: ShutdownReason,
}

/// One replay of a trace against one protocol.
#[derive(Debug)]
pub struct LoadSession<O> {
    session: SessionConfig,
    load: LoadConfig,
    reader: ReaderConfig,
    op: Arc<O>,
    shutdown: Shutdown,
}

impl<O: Operation + 'static> LoadSession<O> {
    /// Assemble a session. Nothing starts until [`run`](Self::run).
    #[must_use]
    pub fn new(session: SessionConfig, load: LoadConfig, reader: ReaderConfig, op: Arc<O>) -> Self {
        Self {
            session,
            load,
            reader,
            op,
            shutdown: Shutdown::new(),
        }
    }

    /// Handle on the run's shutdown signal, e.g. for Ctrl-C.
    #[must_use]
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Replay `trace`, writing the performance stream to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Setup`] if the protocol cannot start,
    /// [`SessionError::Report`] if `out` fails, [`SessionError::Reader`] if
    /// the trace could not be read to the end, and
    /// [`SessionError::Scheduler`] for an aborted or broken schedule.
    pub async fn run<W: Write>(self, trace: &Path, out: W) -> Result<RunSummary, SessionError> {
        let Self {
            session,
            load,
            reader,
            op,
            shutdown,
        } = self;

        op.init().await?;
        let mut reporter = Reporter::new(out);
        reporter.write_header()?;

        let queue = Arc::new(WorkQueue::new(session.queue_capacity));
        let (events, mut received) = mpsc::unbounded_channel::<Event>();

        let reader_task = {
            let queue = Arc::clone(&queue);
            let path = trace.to_owned();
            tokio::spawn(async move { TraceReader::new(reader).run_file(&path, queue.as_ref()).await })
        };
        let scheduler_task = {
            let queue = Arc::clone(&queue);
            let shutdown = shutdown.clone();
            let events = Arc::new(events);
            tokio::spawn(async move { Scheduler::new(load).run(queue, op, events, &shutdown).await })
        };
        tracing::info!(
            "session.run.started: trace={} idle_timeout={:?} drain={:?}",
            trace.display(),
            session.idle_timeout,
            session.drain
        );

        let deadline = sleep(session.idle_timeout);
        tokio::pin!(deadline);
        let mut draining = false;
        let mut idle = false;
        let mut report_error = None;
        loop {
            tokio::select! {
                biased;
                event = received.recv() => {
                    // None: every worker and in-flight call is gone.
                    let Some(event) = event else { break };
                    if let Err(e) = reporter.report(&event) {
                        shutdown.close(ShutdownReason::Fatal(e.to_string()));
                        report_error = Some(e);
                        break;
                    }
                    if !draining {
                        deadline.as_mut().reset(Instant::now() + session.idle_timeout);
                    }
                }
                () = shutdown.closed(), if !draining => {
                    draining = true;
                    deadline.as_mut().reset(Instant::now() + session.drain);
                    tracing::info!("session.drain.started: drain={:?}", session.drain);
                }
                () = &mut deadline => {
                    if !draining {
                        idle = true;
                        shutdown.close(ShutdownReason::IdleTimeout);
                    }
                    break;
                }
            }
        }

        queue.close();
        reader_task.abort();
        if idle {
            scheduler_task.abort();
        }
        let read = settle(reader_task.await);
        let scheduled = settle(scheduler_task.await);

        let reason = shutdown.reason().unwrap_or(ShutdownReason::LoadComplete);
        let summary = RunSummary {
            records: reporter.records(),
            mismatches: reporter.mismatches(),
            dispatched: scheduled.as_ref().ok().copied().flatten(),
            reason,
        };
        tracing::info!(
            "session.run.finished: records={} mismatches={} reason={}",
            summary.records,
            summary.mismatches,
            summary.reason
        );

        if let Some(e) = report_error {
            return Err(e.into());
        }
        if let Err(e) = read {
            tracing::error!("session.reader.failed: {e}");
            return Err(e);
        }
        if let Err(e) = scheduled {
            tracing::error!("session.scheduler.failed: {e}");
            return Err(e);
        }
        Ok(summary)
    }
}

/// Result of a task that may have been aborted. `Ok(None)` when aborted.
fn settle<T, E>(joined: Result<Result<T, E>, JoinError>) -> Result<Option<T>, SessionError>
where
    E: Into<SessionError>,
{
    match joined {
        Ok(result) => result.map(Some).map_err(Into::into),
        Err(e) if e.is_cancelled() => Ok(None),
        Err(e) => Err(SchedulerError::WorkerPanicked {
            reason: e.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadSession, SessionConfig, SessionError};
    use crate::adapters::time_budget::TimeBudgetOperation;
    use reporter::HEADER;
    use scheduler::{LoadConfig, ShutdownReason};
    use std::io::Write as _;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use trace_reader::{ReaderConfig, ReaderError};

    fn line(path: &str) -> String {
        format!("01-Mar-2017 16:00:00.000 0.01 0.0 0 512 {path} 200 GET\n")
    }

    fn trace(dir: &Path, lines: &[String]) -> std::path::PathBuf {
        let path = dir.join("trace.log");
        let mut file = std::fs::File::create(&path).unwrap();
        for l in lines {
            file.write_all(l.as_bytes()).unwrap();
        }
        path
    }

    fn session(reader: ReaderConfig) -> LoadSession<TimeBudgetOperation> {
        LoadSession::new(
            SessionConfig::builder().build().unwrap(),
            LoadConfig::builder(1).seed(7).build().unwrap(),
            reader,
            Arc::new(TimeBudgetOperation::default()),
        )
    }

    fn records(out: &[u8]) -> Vec<String> {
        String::from_utf8(out.to_vec())
            .unwrap()
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn config_validation() {
        assert!(SessionConfig::builder().idle_timeout(Duration::ZERO).build().is_err());
        assert!(SessionConfig::builder().queue_capacity(0).build().is_err());
        let config = SessionConfig::builder().drain(Duration::ZERO).build().unwrap();
        assert_eq!(config.idle_timeout, Duration::from_secs(35));
        assert_eq!(config.queue_capacity, 100);
    }

    // S-T01: three GETs at rate 1 produce exactly three records.
    #[tokio::test(start_paused = true)]
    async fn three_gets_three_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = trace(dir.path(), &[line("/a"), line("/b"), line("/c")]);
        let mut out = Vec::new();

        let summary = session(ReaderConfig::builder().build().unwrap())
            .run(&path, &mut out)
            .await
            .unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.reason, ShutdownReason::LoadComplete);
        assert_eq!(summary.dispatched, Some(3));

        let text = String::from_utf8(out.clone()).unwrap();
        assert_eq!(text.lines().next(), Some(HEADER));
        assert!(text.contains("#request/second = 1"));
        let mut paths: Vec<String> = records(&out)
            .iter()
            .map(|r| r.split_whitespace().nth(6).unwrap().to_owned())
            .collect();
        paths.sort();
        assert_eq!(paths, ["/a", "/b", "/c"]);
    }

    // S-T02: a malformed line is skipped, the good one still runs.
    #[tokio::test(start_paused = true)]
    async fn malformed_line_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = trace(dir.path(), &["not a record\n".to_owned(), line("/ok")]);
        let mut out = Vec::new();

        let summary = session(ReaderConfig::builder().build().unwrap())
            .run(&path, &mut out)
            .await
            .unwrap();

        assert_eq!(summary.records, 1);
        assert!(records(&out)[0].contains(" /ok "));
    }

    // S-T03: a tailed trace that never grows ends on the idle timeout.
    #[tokio::test(start_paused = true)]
    async fn idle_timeout_ends_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = trace(dir.path(), &[line("/old")]);
        let mut out = Vec::new();

        let summary = session(ReaderConfig::builder().tail(true).build().unwrap())
            .run(&path, &mut out)
            .await
            .unwrap();

        assert_eq!(summary.reason, ShutdownReason::IdleTimeout);
        assert_eq!(summary.records, 0);
    }

    // S-T04: an external close ends the run as interrupted.
    #[tokio::test(start_paused = true)]
    async fn external_close_is_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = trace(dir.path(), &[]);
        let session = session(ReaderConfig::builder().tail(true).build().unwrap());
        let shutdown = session.shutdown();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            shutdown.close(ShutdownReason::Interrupted);
        });

        let summary = session.run(&path, Vec::new()).await.unwrap();
        assert_eq!(summary.reason, ShutdownReason::Interrupted);
    }

    // S-T05: a missing trace is reported after the run winds down.
    #[tokio::test(start_paused = true)]
    async fn missing_trace_is_reader_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = session(ReaderConfig::builder().build().unwrap())
            .run(&dir.path().join("absent.log"), Vec::new())
            .await;
        assert!(matches!(
            result,
            Err(SessionError::Reader(ReaderError::Open { .. }))
        ));
    }
}
