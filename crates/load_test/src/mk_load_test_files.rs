// Rust guideline compliant 2026-10-18

//! `mk_load_test_files`: create the files a read-only trace expects, so a
//! later `run_load_test --protocol fs` (or a web server over the same tree)
//! answers its GETs.
//!
//! # Usage
//!
//! ```text
//! mk_load_test_files [-v] [--from N --for N] [--zero] trace.log [root-dir]
//! ```

use anyhow::Context as _;
use clap::Parser;
use load_test::adapters::filesystem::FilesystemOperation;
use load_test::fixture::{FixtureOptions, create_fixtures};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "mk_load_test_files")]
#[command(about = "Create the files a load-test trace expects to find", long_about = None)]
#[command(version)]
struct Cli {
    /// Trace file in perf format
    trace: PathBuf,

    /// Directory to create files under
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Records to skip before starting
    #[arg(long, default_value_t = 0)]
    from: u64,

    /// Records to use; 0 uses them all
    #[arg(long = "for", default_value_t = 0)]
    run_for: u64,

    /// Create zero-size files
    #[arg(long)]
    zero: bool,

    /// Log every file created
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let options = FixtureOptions {
        skip: cli.from,
        limit: (cli.run_for > 0).then_some(cli.run_for),
        zero: cli.zero,
    };
    let target = FilesystemOperation::new(&cli.root);
    let summary = create_fixtures(&cli.trace, &target, options)
        .await
        .with_context(|| format!("cannot create files for {}", cli.trace.display()))?;

    tracing::info!(
        "mk_load_test_files.done: root={} created={} ignored={}",
        cli.root.display(),
        summary.created,
        summary.ignored
    );
    Ok(())
}
