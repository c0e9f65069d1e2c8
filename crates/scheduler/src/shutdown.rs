// Rust guideline compliant 2026-10-18

//! Shutdown coordinator: a write-once broadcast observed by every worker and
//! by the session driver.

use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// Why a run stopped creating new work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The load profile finished (ramp complete or trace drained).
    LoadComplete,
    /// No event arrived within the idle timeout.
    IdleTimeout,
    /// The operator interrupted the run.
    Interrupted,
    /// An unrecoverable error; the run must end with a failure.
    Fatal(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadComplete => f.write_str("load complete"),
            Self::IdleTimeout => f.write_str("idle timeout"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::Fatal(reason) => write!(f, "fatal: {reason}"),
        }
    }
}

/// Single-close broadcast signal. Cheap to clone; all clones share state.
///
/// Closing stops the creation of new work only. Operations already
/// dispatched run to completion.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl Shutdown {
    /// A fresh, open signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the signal. Returns `true` for the call that actually closed it;
    /// later calls are no-ops and the first reason is kept.
    pub fn close(&self, reason: ShutdownReason) -> bool {
        let first = self.reason.set(reason.clone()).is_ok();
        if first {
            tracing::info!("shutdown.closed: {reason}");
            self.token.cancel();
        } else {
            tracing::debug!("shutdown.close.ignored: already closed, {reason}");
        }
        first
    }

    /// `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason given by the first close, if any.
    #[must_use]
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().cloned()
    }

    /// Resolve once the signal is closed.
    pub async fn closed(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::{Shutdown, ShutdownReason};
    use std::time::Duration;

    #[test]
    fn close_is_idempotent_and_first_reason_wins() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_closed());
        assert_eq!(shutdown.reason(), None);

        assert!(shutdown.close(ShutdownReason::IdleTimeout));
        assert!(!shutdown.close(ShutdownReason::LoadComplete));
        assert!(!shutdown.clone().close(ShutdownReason::Interrupted));

        assert!(shutdown.is_closed());
        assert_eq!(shutdown.reason(), Some(ShutdownReason::IdleTimeout));
    }

    #[tokio::test]
    async fn every_waiter_observes_close() {
        let shutdown = Shutdown::new();
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let s = shutdown.clone();
                tokio::spawn(async move { s.closed().await })
            })
            .collect();

        tokio::task::yield_now().await;
        shutdown.close(ShutdownReason::LoadComplete);

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn closed_resolves_immediately_after_close() {
        let shutdown = Shutdown::new();
        shutdown.close(ShutdownReason::Fatal("boom".to_owned()));
        shutdown.closed().await;
        assert_eq!(shutdown.reason().unwrap().to_string(), "fatal: boom");
    }
}
