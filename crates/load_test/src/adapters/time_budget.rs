// Rust guideline compliant 2026-10-18

//! `Operation` adapter that spends a fixed time per call and succeeds.
//!
//! Used for calibration and dry runs: the engine's own overhead shows up as
//! the difference between reported and budgeted latency.

use domain::{Measurement, Operation, OperationError, Operator};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Per-call budgets.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    /// Time spent by GET and POST.
    pub read: Duration,
    /// Time spent by PUT.
    pub write: Duration,
}

impl Default for TimeBudget {
    fn default() -> Self {
        Self {
            read: Duration::from_millis(100),
            write: Duration::from_secs(1),
        }
    }
}

/// Timed no-op protocol. Always reports `200`.
#[derive(Debug, Default)]
pub struct TimeBudgetOperation {
    budget: TimeBudget,
}

impl TimeBudgetOperation {
    /// Create an adapter with the given budgets.
    #[must_use]
    pub fn new(budget: TimeBudget) -> Self {
        Self { budget }
    }

    async fn spend(&self, path: &str, operator: Operator, budget: Duration, bytes: u64) -> Measurement {
        let started = SystemTime::now();
        let initial = Instant::now();
        tokio::time::sleep(budget).await;
        Measurement {
            started,
            latency: initial.elapsed(),
            transfer_time: Duration::ZERO,
            bytes,
            path: path.to_owned(),
            status: 200,
            operator,
            failed: false,
        }
    }
}

impl Operation for TimeBudgetOperation {
    fn name(&self) -> &str {
        "time-budget"
    }

    async fn init(&self) -> Result<(), OperationError> {
        tracing::info!(
            "time_budget.init: read={:?} write={:?}",
            self.budget.read,
            self.budget.write
        );
        Ok(())
    }

    async fn get(&self, path: &str, _expected: Option<i32>) -> Measurement {
        self.spend(path, Operator::Get, self.budget.read, 0).await
    }

    async fn put(&self, path: &str, size: i64, _expected: Option<i32>) -> Measurement {
        let bytes = u64::try_from(size).unwrap_or(0);
        self.spend(path, Operator::Put, self.budget.write, bytes).await
    }

    async fn post(&self, path: &str, _size: i64, _expected: Option<i32>, body: &str) -> Measurement {
        self.spend(path, Operator::Post, self.budget.read, body.len() as u64)
            .await
    }
}
