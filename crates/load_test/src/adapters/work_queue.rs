// Rust guideline compliant 2026-10-18

//! Bounded multi-consumer adapter for the `TraceSink` and `TraceSource` ports.
//!
//! A full queue parks the writer and an empty, open queue parks readers.
//! Explicit `close()` signals end-of-data: readers drain what is left, then
//! get `Closed`.

use std::collections::VecDeque;

use domain::{QueueError, TraceRecord, TraceSink, TraceSource};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Default capacity: enough to absorb a burst without letting a slow target
/// turn the trace into an unbounded backlog.
pub const DEFAULT_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// Inner state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct WorkQueueInner {
    records: VecDeque<TraceRecord>,
    closed: bool,
}

// ---------------------------------------------------------------------------
// WorkQueue
// ---------------------------------------------------------------------------

/// FIFO hand-off between the trace reader and the workers.
///
/// Each record is returned by exactly one `pop`. The lock is never held
/// across an `.await`.
#[derive(Debug)]
pub struct WorkQueue {
    inner: Mutex<WorkQueueInner>,
    capacity: usize,
    /// Signalled when a record arrives or the queue closes.
    readable: Notify,
    /// Signalled when a slot frees up or the queue closes.
    writable: Notify,
}

impl WorkQueue {
    /// Create an empty, open queue holding at most `capacity` records
    /// (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(WorkQueueInner {
                records: VecDeque::with_capacity(capacity.max(1)),
                closed: false,
            }),
            capacity: capacity.max(1),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    /// Maximum number of buffered records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TraceSink for WorkQueue {
    /// Append `record`, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue is (or becomes) closed.
    async fn push(&self, record: TraceRecord) -> Result<(), QueueError> {
        loop {
            // Register interest before checking state so a concurrent pop or
            // close cannot slip between the check and the wait.
            let writable = self.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return Err(QueueError::Closed);
                }
                if inner.records.len() < self.capacity {
                    inner.records.push_back(record);
                    drop(inner);
                    self.readable.notify_one();
                    return Ok(());
                }
            }
            writable.await;
        }
    }

    /// Signal end-of-data. Idempotent: safe to call multiple times.
    fn close(&self) {
        self.inner.lock().closed = true;
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}

impl TraceSource for WorkQueue {
    /// Take the oldest record, waiting while the queue is open and empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] when the queue is closed and drained.
    async fn pop(&self) -> Result<TraceRecord, QueueError> {
        loop {
            let readable = self.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                if let Some(record) = inner.records.pop_front() {
                    drop(inner);
                    self.writable.notify_one();
                    return Ok(record);
                }
                if inner.closed {
                    return Err(QueueError::Closed);
                }
            }
            readable.await;
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
