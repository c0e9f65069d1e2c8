// Rust guideline compliant 2026-10-18

//! `run_load_test`: replay a trace of requests against a target at a
//! controlled rate, printing one performance line per completed request on
//! stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! # Steady 50 requests/s against a web server
//! run_load_test --tps 50 trace.log http://origin.example.com
//!
//! # Ramp from 10 to 200 requests/s in steps of 10 every 30 s, read-write
//! run_load_test --tps 200 --progress 10 --duration 30 --rw 65536 trace.log http://origin
//!
//! # Replay against an S3 bucket with credentials from a file
//! run_load_test --protocol s3 --s3-bucket media --credentials ~/.s3creds --tps 20 trace.log http://minio:9000
//! ```

use anyhow::{Context as _, bail};
use clap::{Parser, ValueEnum};
use domain::Operation;
use load_test::adapters::filesystem::FilesystemOperation;
use load_test::adapters::rest::{RestOperation, RestOptions};
use load_test::adapters::s3::{DEFAULT_REGION, S3Config, S3Operation};
use load_test::adapters::time_budget::TimeBudgetOperation;
use load_test::credentials::S3Credentials;
use load_test::payload::Payload;
use load_test::session::{LoadSession, RunSummary, SessionConfig};
use scheduler::{LoadConfig, ShutdownReason};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use trace_reader::ReaderConfig;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Protocol {
    Rest,
    S3,
    Fs,
    TimeBudget,
}

#[derive(Parser, Debug)]
#[command(name = "run_load_test")]
#[command(about = "Replay a request trace against a target at a controlled rate", long_about = None)]
#[command(version)]
struct Cli {
    /// Trace file in perf format
    trace: PathBuf,

    /// Base URL (rest), endpoint (s3) or root directory (fs)
    target: Option<String>,

    /// Requests per second to reach
    #[arg(long)]
    tps: usize,

    /// Ramp up in steps of this many requests per second
    #[arg(long, default_value_t = 0)]
    progress: usize,

    /// Requests per second to start a ramp from
    #[arg(long, default_value_t = 0)]
    start_tps: usize,

    /// Seconds per ramp step
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Records to skip before starting
    #[arg(long, default_value_t = 0)]
    from: u64,

    /// Records to use; 0 uses them all
    #[arg(long = "for", default_value_t = 0)]
    run_for: u64,

    /// Read-only test (the default)
    #[arg(long, conflicts_with_all = ["rw", "wo"])]
    ro: bool,

    /// Read-write test with a write payload of N bytes
    #[arg(long, value_name = "N", conflicts_with = "wo")]
    rw: Option<i64>,

    /// Write-only test with a write payload of N bytes
    #[arg(long, value_name = "N")]
    wo: Option<i64>,

    /// Seconds between the requests of one worker
    #[arg(long, default_value_t = 1.0)]
    sleep: f64,

    /// Text removed from the front of every path
    #[arg(long, default_value = "")]
    strip: String,

    /// Value for the Host header
    #[arg(long)]
    host_header: Option<String>,

    /// Extra headers, as "key:value key:value"
    #[arg(long, default_value = "")]
    headers: String,

    /// Allow caching (omit cache-control: no-cache)
    #[arg(long)]
    cache: bool,

    /// Follow the trace as it grows, like tail -f
    #[arg(long, conflicts_with = "rewind")]
    tail: bool,

    /// Start over at the end of the trace
    #[arg(long)]
    rewind: bool,

    /// Wait for each request before the next one
    #[arg(long)]
    serialize: bool,

    /// Start all workers at once, without jitter
    #[arg(long)]
    thundering_herd: bool,

    /// Stop the run on the first failed request
    #[arg(long)]
    crash: bool,

    /// Ask the CDN for its debugging headers
    #[arg(long)]
    akamai_debug: bool,

    /// Dump every request and response
    #[arg(short, long)]
    verbose: bool,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,

    /// Seconds without a completed request before the run ends
    #[arg(long, default_value_t = 35)]
    idle_timeout: u64,

    /// Seed for the start-up jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Protocol spoken to the target
    #[arg(long, value_enum, default_value_t = Protocol::Rest)]
    protocol: Protocol,

    /// Root directory for the fs protocol (defaults to the target)
    #[arg(long)]
    root: Option<PathBuf>,

    /// S3 bucket
    #[arg(long)]
    s3_bucket: Option<String>,

    /// S3 access key
    #[arg(long, env = "S3_ACCESS_KEY", hide_env_values = true)]
    s3_key: Option<String>,

    /// S3 secret key
    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true)]
    s3_secret: Option<String>,

    /// S3 signing region
    #[arg(long, default_value = DEFAULT_REGION)]
    s3_region: String,

    /// File with S3_ACCESS_KEY and S3_SECRET_KEY lines
    #[arg(long)]
    credentials: Option<PathBuf>,
}

impl Cli {
    /// Write payload size: `--wo` wins over `--rw`, zero means none.
    fn payload_size(&self) -> i64 {
        self.wo.or(self.rw).unwrap_or(0)
    }

    fn read_enabled(&self) -> bool {
        self.ro || self.rw.is_some() || self.wo.is_none()
    }

    fn write_enabled(&self) -> bool {
        !self.ro && (self.rw.is_some() || self.wo.is_some())
    }

    fn target(&self) -> anyhow::Result<&str> {
        self.target
            .as_deref()
            .with_context(|| format!("the {:?} protocol needs a target argument", self.protocol))
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(cli: &Cli) -> anyhow::Result<LoadConfig> {
    let tick = Duration::try_from_secs_f64(cli.sleep)
        .with_context(|| format!("--sleep {} is not a usable interval", cli.sleep))?;
    let mut builder = LoadConfig::builder(cli.tps)
        .progress(cli.progress)
        .start_rate(cli.start_tps)
        .step_duration(Duration::from_secs(cli.duration))
        .tick(tick)
        .read(cli.read_enabled())
        .write(cli.write_enabled())
        .thundering_herd(cli.thundering_herd)
        .serialize(cli.serialize)
        .crash_on_error(cli.crash);
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    builder.build().context("invalid load parameters")
}

fn reader_config(cli: &Cli) -> anyhow::Result<ReaderConfig> {
    let mut builder = ReaderConfig::builder()
        .skip(cli.from)
        .tail(cli.tail)
        .rewind(cli.rewind)
        .strip(cli.strip.as_str());
    if cli.run_for > 0 {
        builder = builder.limit(cli.run_for);
    }
    builder.build().context("invalid trace parameters")
}

async fn s3_credentials(cli: &Cli) -> anyhow::Result<S3Credentials> {
    if let Some(path) = &cli.credentials {
        return S3Credentials::load(path).await.context("cannot load s3 credentials");
    }
    match (&cli.s3_key, &cli.s3_secret) {
        (Some(access_key), Some(secret_key)) => Ok(S3Credentials {
            access_key: access_key.clone(),
            secret_key: secret_key.clone(),
        }),
        _ => bail!("s3 needs --credentials or both --s3-key and --s3-secret"),
    }
}

/// Run one session with `op`, stopping cleanly on Ctrl-C.
async fn replay<O: Operation + 'static>(
    cli: &Cli,
    session: SessionConfig,
    load: LoadConfig,
    reader: ReaderConfig,
    op: O,
) -> anyhow::Result<RunSummary> {
    tracing::info!("run_load_test.protocol: {}", op.name());
    let session = LoadSession::new(session, load, reader, Arc::new(op));
    let shutdown = session.shutdown();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("run_load_test.interrupted: draining");
            shutdown.close(ShutdownReason::Interrupted);
        }
    });
    session
        .run(&cli.trace, std::io::stdout())
        .await
        .with_context(|| format!("load test of {} failed", cli.trace.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let load = load_config(&cli)?;
    let reader = reader_config(&cli)?;
    let session = SessionConfig::builder()
        .idle_timeout(Duration::from_secs(cli.idle_timeout))
        .build()
        .context("invalid session parameters")?;

    // Lives until the run ends; dropping it removes the file.
    let payload = Payload::create(&std::env::temp_dir(), cli.payload_size())
        .await
        .context("cannot prepare write payload")?
        .map(Arc::new);

    let summary = match cli.protocol {
        Protocol::Rest => {
            let options = RestOptions {
                host_header: cli.host_header.clone(),
                headers: RestOptions::parse_headers(&cli.headers)?,
                allow_cache: cli.cache,
                akamai_debug: cli.akamai_debug,
                verbose: cli.verbose,
            };
            let op = RestOperation::new(cli.target()?, options, payload.clone())?;
            replay(&cli, session, load, reader, op).await?
        }
        Protocol::S3 => {
            let config = S3Config {
                endpoint: cli.target()?.to_owned(),
                bucket: cli.s3_bucket.clone().context("s3 needs --s3-bucket")?,
                credentials: s3_credentials(&cli).await?,
                region: cli.s3_region.clone(),
            };
            let op = S3Operation::new(&config, payload.clone())?;
            replay(&cli, session, load, reader, op).await?
        }
        Protocol::Fs => {
            let root = match &cli.root {
                Some(root) => root.clone(),
                None => PathBuf::from(cli.target()?),
            };
            replay(&cli, session, load, reader, FilesystemOperation::new(root)).await?
        }
        Protocol::TimeBudget => {
            replay(&cli, session, load, reader, TimeBudgetOperation::default()).await?
        }
    };
    drop(payload);

    tracing::info!(
        "run_load_test.done: records={} mismatches={} reason={}",
        summary.records,
        summary.mismatches,
        summary.reason
    );
    Ok(())
}
