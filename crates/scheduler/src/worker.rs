// Rust guideline compliant 2026-10-18

//! Worker loop and operation dispatch.
//!
//! A worker waits for its jitter, then ticks once per `tick`. Each tick pulls
//! exactly one record and dispatches it; the operation itself runs on its own
//! task unless serialize mode is on.

use crate::SchedulerError;
use crate::shutdown::{Shutdown, ShutdownReason};
use domain::{
    Direction, Event, EventSink, Measurement, Operation, Operator, PerfRecord, QueueError,
    TraceRecord, TraceSource,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Worker-visible part of the load configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerSettings {
    pub(crate) tick: Duration,
    pub(crate) read: bool,
    pub(crate) write: bool,
    pub(crate) serialize: bool,
    pub(crate) crash_on_error: bool,
}

/// State shared by every worker and dispatch task of one run.
pub(crate) struct Shared<S, O, E> {
    pub(crate) source: Arc<S>,
    pub(crate) op: Arc<O>,
    pub(crate) events: Arc<E>,
    pub(crate) shutdown: Shutdown,
    pub(crate) settings: WorkerSettings,
    /// Offered rate; written by the scheduler, read racily by dispatch tasks.
    pub(crate) rate: AtomicUsize,
    pub(crate) dispatched: AtomicU64,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A record reduced to exactly what one operation call needs.
#[derive(Debug)]
enum Request {
    Get {
        path: String,
    },
    Put {
        path: String,
        size: i64,
    },
    Post {
        path: String,
        size: i64,
        body: String,
    },
}

impl Request {
    /// `Ok(None)` for operators outside the engine's capability set.
    fn from_record(record: TraceRecord) -> Result<Option<Self>, SchedulerError> {
        let invariant = |reason: String| SchedulerError::Invariant { reason };
        Ok(Some(match record.operator {
            Operator::Get => Self::Get { path: record.path },
            Operator::Put => {
                let size = record
                    .size()
                    .map_err(|e| invariant(format!("PUT {}: {e}", record.path)))?;
                Self::Put {
                    path: record.path,
                    size,
                }
            }
            Operator::Post => {
                let Some(body) = record.body else {
                    return Err(invariant(format!("POST {} reached dispatch without a body", record.path)));
                };
                // A missing size is tolerated on POST; the body length is what gets sent.
                let size = record.bytes.parse().unwrap_or(0);
                Self::Post {
                    path: record.path,
                    size,
                    body,
                }
            }
            Operator::Other(_) => return Ok(None),
        }))
    }

    async fn execute<O: Operation>(self, op: &O, expected: Option<i32>) -> Measurement {
        match self {
            Self::Get { path } => op.get(&path, expected).await,
            Self::Put { path, size } => op.put(&path, size, expected).await,
            Self::Post { path, size, body } => op.post(&path, size, expected, &body).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

impl<S, O, E> Shared<S, O, E>
where
    S: TraceSource + 'static,
    O: Operation + 'static,
    E: EventSink + 'static,
{
    fn permits(&self, direction: Direction) -> bool {
        match direction {
            Direction::Read => self.settings.read,
            Direction::Write => self.settings.write,
        }
    }

    /// Run one worker until end of data, shutdown, or an invariant violation.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Invariant`] after closing the shutdown signal
    /// with a fatal reason.
    pub(crate) async fn work(self: Arc<Self>, id: usize, jitter: Duration) -> Result<(), SchedulerError> {
        if !jitter.is_zero() {
            tokio::select! {
                biased;
                () = self.shutdown.closed() => return Ok(()),
                () = tokio::time::sleep(jitter) => {}
            }
        }

        let tick = self.settings.tick;
        // A pop that blocks longer than this re-anchors the tick schedule.
        let slack = tick / 10;
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let ticked_at = tokio::select! {
                biased;
                () = self.shutdown.closed() => break,
                at = ticker.tick() => at,
            };
            let popped = tokio::select! {
                biased;
                () = self.shutdown.closed() => break,
                popped = self.source.pop() => popped,
            };
            let record = match popped {
                Ok(record) => record,
                Err(QueueError::Closed) => {
                    tracing::debug!("scheduler.worker.stopped: id={id} end of data");
                    return Ok(());
                }
            };
            if ticked_at.elapsed() > slack {
                ticker.reset();
            }
            if let Err(e) = Arc::clone(&self).dispatch(record).await {
                self.shutdown.close(ShutdownReason::Fatal(e.to_string()));
                return Err(e);
            }
        }
        tracing::debug!("scheduler.worker.stopped: id={id} shutdown");
        Ok(())
    }

    /// Start the operation for `record`, or drop it when not permitted.
    async fn dispatch(self: Arc<Self>, record: TraceRecord) -> Result<(), SchedulerError> {
        let Some(direction) = record.operator.direction() else {
            tracing::warn!(
                "scheduler.dispatch.ignored: operation {} invalid, path={}",
                record.operator,
                record.path
            );
            return Ok(());
        };
        if !self.permits(direction) {
            tracing::debug!(
                "scheduler.dispatch.filtered: {} {} not enabled",
                record.operator,
                record.path
            );
            return Ok(());
        }

        let expected = record.expected_code();
        let Some(request) = Request::from_record(record)? else {
            return Ok(());
        };
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        let shared = Arc::clone(&self);
        let call = async move {
            let measurement = request.execute(&*shared.op, expected).await;
            shared.complete(measurement, expected);
        };
        if self.settings.serialize {
            call.await;
        } else {
            drop(tokio::spawn(call));
        }
        Ok(())
    }

    fn complete(&self, measurement: Measurement, expected: Option<i32>) {
        if self.settings.crash_on_error && measurement.failed {
            self.shutdown.close(ShutdownReason::Fatal(format!(
                "{} {} returned {}",
                measurement.operator, measurement.path, measurement.status
            )));
        }
        self.events.emit(Event::Performance(PerfRecord {
            measurement,
            offered_rate: self.rate.load(Ordering::Relaxed),
            expected,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::Request;
    use crate::SchedulerError;
    use domain::TraceRecord;

    fn record(line: &str) -> TraceRecord {
        TraceRecord::from_fields(line.split_whitespace().map(str::to_owned).collect()).unwrap()
    }

    #[test]
    fn post_without_body_is_an_invariant_violation() {
        let mut post = record("d t 0 0 0 3 /f 200 POST abc");
        post.body = None;
        let result = Request::from_record(post);
        assert!(matches!(result, Err(SchedulerError::Invariant { .. })));
    }

    #[test]
    fn put_with_bad_size_is_an_invariant_violation() {
        let mut put = record("d t 0 0 0 3 /f 201 PUT");
        put.bytes = "three".to_owned();
        let result = Request::from_record(put);
        assert!(matches!(result, Err(SchedulerError::Invariant { .. })));
    }

    #[test]
    fn unknown_operator_yields_no_request() {
        let result = Request::from_record(record("d t 0 0 0 0 /f 200 HEAD")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn post_keeps_body_and_size() {
        let request = Request::from_record(record("d t 0 0 0 7 /f 200 POST a=1")).unwrap();
        assert!(matches!(
            request,
            Some(Request::Post { size: 7, ref body, .. }) if body == "a=1"
        ));
    }
}
