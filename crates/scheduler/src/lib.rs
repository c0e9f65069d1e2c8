// Rust guideline compliant 2026-10-18

//! Load scheduler component -- grows a pool of workers that each pull one
//! record per tick from a [`TraceSource`] and dispatch it to an
//! [`Operation`], reporting through an [`EventSink`].
//!
//! Entry points: [`Scheduler::run`], [`Shutdown`], [`Ramp`].
//! Configuration via [`LoadConfig::builder`].
//!
//! Offered rate equals the number of live workers; it only grows during a
//! run. Every change is announced with [`Event::RateChanged`].

mod ramp;
mod shutdown;
mod worker;

pub use ramp::{Ramp, RampStep};
pub use shutdown::{Shutdown, ShutdownReason};

use domain::{Event, EventSink, Operation, TraceSource};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, interval, interval_at};
use worker::{Shared, WorkerSettings};

// ---------------------------------------------------------------------------
// SchedulerError
// ---------------------------------------------------------------------------

/// Errors that end a scheduler run.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The supplied configuration is invalid.
    #[error("invalid load configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// A record that the reader should have rejected reached dispatch.
    #[error("internal invariant violated: {reason}")]
    Invariant {
        /// What was wrong with the record.
        reason: String,
    },
    /// The run was shut down with a fatal reason (e.g. crash-on-error).
    #[error("run aborted: {reason}")]
    Aborted {
        /// The fatal shutdown reason.
        reason: String,
    },
    /// A worker task panicked.
    #[error("worker task failed: {reason}")]
    WorkerPanicked {
        /// Join error description.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// LoadConfig + builder
// ---------------------------------------------------------------------------

/// Shape of the offered load over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadProfile {
    /// `rate` workers until the trace is exhausted.
    ///
    /// Exhausted means the queue is closed and empty. A queue that stays open
    /// (tail mode) keeps the run going until shutdown is requested.
    Steady {
        /// Worker count.
        rate: usize,
    },
    /// `start` workers, `step` more every `step_duration`, never above `target`.
    Progressive {
        /// Initial worker count.
        start: usize,
        /// Workers added per step.
        step: usize,
        /// Upper bound on the worker count.
        target: usize,
        /// Time between steps.
        step_duration: Duration,
    },
}

/// Runtime configuration for a [`Scheduler`]. Immutable for one run.
///
/// Construct via [`LoadConfig::builder`].
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Steady or progressive load.
    pub profile: LoadProfile,
    /// Per-worker dispatch period.
    pub tick: Duration,
    /// GET and POST records are dispatched.
    pub read: bool,
    /// PUT records are dispatched.
    pub write: bool,
    /// Start all workers without jitter.
    pub thundering_herd: bool,
    /// Await each operation before the worker's next tick.
    pub serialize: bool,
    /// Close the run with a fatal reason on the first failed operation.
    pub crash_on_error: bool,
    /// Optional RNG seed for reproducible jitter. `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// Builder for [`LoadConfig`].
///
/// Obtain via [`LoadConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct LoadConfigBuilder {
    target_rate: usize,
    step: usize,
    start_rate: usize,
    step_duration: Duration,
    tick: Duration,
    read: bool,
    write: bool,
    thundering_herd: bool,
    serialize: bool,
    crash_on_error: bool,
    seed: Option<u64>,
}

impl LoadConfig {
    /// Create a builder. `target_rate` is the only required parameter.
    ///
    /// Default values: steady profile, `step_duration = 10 s`, `tick = 1 s`,
    /// read-only, jitter on, asynchronous dispatch, no crash on error.
    #[must_use]
    pub fn builder(target_rate: usize) -> LoadConfigBuilder {
        LoadConfigBuilder {
            target_rate,
            step: 0,
            start_rate: 0,
            step_duration: Duration::from_secs(10),
            tick: Duration::from_secs(1),
            read: true,
            write: false,
            thundering_herd: false,
            serialize: false,
            crash_on_error: false,
            seed: None,
        }
    }

    /// Highest offered rate this configuration can reach.
    #[must_use]
    pub fn target_rate(&self) -> usize {
        match self.profile {
            LoadProfile::Steady { rate } => rate,
            LoadProfile::Progressive { target, .. } => target,
        }
    }
}

impl LoadConfigBuilder {
    /// Ramp by `step` workers per step. Zero keeps the steady profile.
    #[must_use]
    pub fn progress(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Initial worker count of a progressive run. Zero means one step.
    #[must_use]
    pub fn start_rate(mut self, rate: usize) -> Self {
        self.start_rate = rate;
        self
    }

    /// Time between ramp steps.
    #[must_use]
    pub fn step_duration(mut self, duration: Duration) -> Self {
        self.step_duration = duration;
        self
    }

    /// Per-worker dispatch period.
    #[must_use]
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Enable GET and POST.
    #[must_use]
    pub fn read(mut self, enabled: bool) -> Self {
        self.read = enabled;
        self
    }

    /// Enable PUT.
    #[must_use]
    pub fn write(mut self, enabled: bool) -> Self {
        self.write = enabled;
        self
    }

    /// Start every worker at once, without jitter.
    #[must_use]
    pub fn thundering_herd(mut self, enabled: bool) -> Self {
        self.thundering_herd = enabled;
        self
    }

    /// Wait for each operation before the next tick. This lowers the offered
    /// rate to whatever the target sustains; meant for calibration runs.
    #[must_use]
    pub fn serialize(mut self, enabled: bool) -> Self {
        self.serialize = enabled;
        self
    }

    /// Abort the run on the first failed operation.
    #[must_use]
    pub fn crash_on_error(mut self, enabled: bool) -> Self {
        self.crash_on_error = enabled;
        self
    }

    /// Fix the RNG seed for deterministic jitter (useful in tests).
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] when the target rate is
    /// zero, neither reads nor writes are enabled, the tick or step duration
    /// is zero, or the starting rate exceeds the target.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<LoadConfig, SchedulerError> {
        let invalid = |reason: String| SchedulerError::InvalidConfig { reason };
        if self.target_rate == 0 {
            return Err(invalid("target rate must be >= 1".to_owned()));
        }
        if !self.read && !self.write {
            return Err(invalid("neither reads nor writes are enabled".to_owned()));
        }
        if self.tick.is_zero() {
            return Err(invalid("tick must be > 0".to_owned()));
        }

        let profile = if self.step == 0 {
            LoadProfile::Steady {
                rate: self.target_rate,
            }
        } else {
            if self.step_duration.is_zero() {
                return Err(invalid("step duration must be > 0".to_owned()));
            }
            let start = if self.start_rate == 0 {
                self.step
            } else {
                self.start_rate
            };
            if start > self.target_rate {
                return Err(invalid(format!(
                    "starting rate {start} exceeds target rate {}",
                    self.target_rate
                )));
            }
            LoadProfile::Progressive {
                start,
                step: self.step,
                target: self.target_rate,
                step_duration: self.step_duration,
            }
        };

        Ok(LoadConfig {
            profile,
            tick: self.tick,
            read: self.read,
            write: self.write,
            thundering_herd: self.thundering_herd,
            serialize: self.serialize,
            crash_on_error: self.crash_on_error,
            seed: self.seed,
        })
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Drives one load profile to completion.
#[derive(Debug)]
pub struct Scheduler {
    config: LoadConfig,
    rng: StdRng,
}

/// Live workers plus the state they share.
struct Pool<S, O, E> {
    shared: Arc<Shared<S, O, E>>,
    workers: JoinSet<Result<(), SchedulerError>>,
    rng: StdRng,
    jitter: bool,
    spawned: usize,
}

impl<S, O, E> Pool<S, O, E>
where
    S: TraceSource + 'static,
    O: Operation + 'static,
    E: EventSink + 'static,
{
    /// Start `count` more workers and publish the new offered rate.
    fn grow(&mut self, count: usize) {
        let tick = self.shared.settings.tick;
        for _ in 0..count {
            let jitter = if self.jitter {
                tick.mul_f64(self.rng.random::<f64>())
            } else {
                Duration::ZERO
            };
            let id = self.spawned;
            self.spawned += 1;
            self.workers.spawn(Arc::clone(&self.shared).work(id, jitter));
        }
        self.shared.rate.store(self.spawned, Ordering::Relaxed);
        self.shared.events.emit(Event::RateChanged(self.spawned));
        tracing::info!("scheduler.rate.changed: rate={}", self.spawned);
    }

    fn trace_exhausted(&self) -> bool {
        self.shared.source.is_closed() && self.shared.source.is_empty()
    }

    /// Fold one finished worker into the run outcome.
    fn joined(
        &self,
        joined: Result<Result<(), SchedulerError>, tokio::task::JoinError>,
    ) -> Result<(), SchedulerError> {
        match joined {
            Ok(result) => result,
            Err(e) => {
                let reason = e.to_string();
                self.shared
                    .shutdown
                    .close(ShutdownReason::Fatal(format!("worker failed: {reason}")));
                Err(SchedulerError::WorkerPanicked { reason })
            }
        }
    }

    async fn steady(&mut self, rate: usize) -> Result<(), SchedulerError> {
        self.grow(rate);
        let mut poll = interval(self.shared.settings.tick);
        loop {
            tokio::select! {
                biased;
                () = self.shared.shutdown.closed() => return Ok(()),
                Some(joined) = self.workers.join_next() => self.joined(joined)?,
                _ = poll.tick() => {
                    if self.trace_exhausted() {
                        tracing::info!("scheduler.steady.done: trace exhausted");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn progressive(&mut self, mut ramp: Ramp, step_duration: Duration) -> Result<(), SchedulerError> {
        self.grow(ramp.rate());
        let mut steps = interval_at(Instant::now() + step_duration, step_duration);
        loop {
            tokio::select! {
                biased;
                () = self.shared.shutdown.closed() => return Ok(()),
                Some(joined) = self.workers.join_next() => self.joined(joined)?,
                _ = steps.tick() => {
                    if self.trace_exhausted() {
                        tracing::info!("scheduler.ramp.stopped: trace exhausted at rate={}", ramp.rate());
                        return Ok(());
                    }
                    match ramp.advance() {
                        RampStep::Grow { added, .. } => self.grow(added),
                        RampStep::Complete => {
                            tracing::info!("scheduler.ramp.complete: rate={}", ramp.rate());
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

impl Scheduler {
    /// Create a scheduler from `config`.
    ///
    /// Seeds the RNG from `config.seed` if set, otherwise from the OS.
    #[must_use]
    pub fn new(config: LoadConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    /// Run the load profile until it completes or `shutdown` closes.
    ///
    /// On return the shutdown signal is closed (with
    /// [`ShutdownReason::LoadComplete`] unless something closed it earlier)
    /// and every worker has exited. Dispatched operations may still be in
    /// flight; their events keep arriving on `events`.
    ///
    /// Returns the number of operations dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Invariant`] when a malformed record reaches
    /// dispatch, [`SchedulerError::WorkerPanicked`] when a worker dies, and
    /// [`SchedulerError::Aborted`] when the run was closed with a fatal reason.
    pub async fn run<S, O, E>(
        self,
        source: Arc<S>,
        op: Arc<O>,
        events: Arc<E>,
        shutdown: &Shutdown,
    ) -> Result<u64, SchedulerError>
    where
        S: TraceSource + 'static,
        O: Operation + 'static,
        E: EventSink + 'static,
    {
        let config = self.config;
        let shared = Arc::new(Shared {
            source,
            op,
            events,
            shutdown: shutdown.clone(),
            settings: WorkerSettings {
                tick: config.tick,
                read: config.read,
                write: config.write,
                serialize: config.serialize,
                crash_on_error: config.crash_on_error,
            },
            rate: AtomicUsize::new(0),
            dispatched: AtomicU64::new(0),
        });
        let mut pool = Pool {
            shared: Arc::clone(&shared),
            workers: JoinSet::new(),
            rng: self.rng,
            jitter: !config.thundering_herd,
            spawned: 0,
        };

        tracing::info!("scheduler.run.started: profile={:?}", config.profile);
        let outcome = match config.profile {
            LoadProfile::Steady { rate } => pool.steady(rate).await,
            LoadProfile::Progressive {
                start,
                step,
                target,
                step_duration,
            } => pool.progressive(Ramp::new(start, step, target), step_duration).await,
        };
        shutdown.close(ShutdownReason::LoadComplete);

        let mut first_error = outcome.err();
        while let Some(joined) = pool.workers.join_next().await {
            if let Err(e) = pool.joined(joined) {
                first_error.get_or_insert(e);
            }
        }
        if first_error.is_none()
            && let Some(ShutdownReason::Fatal(reason)) = shutdown.reason()
        {
            first_error = Some(SchedulerError::Aborted { reason });
        }

        let dispatched = shared.dispatched.load(Ordering::Relaxed);
        tracing::info!(
            "scheduler.run.stopped: workers={} dispatched={dispatched}",
            pool.spawned
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(dispatched),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
