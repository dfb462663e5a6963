//! CLI binary for matrix benchmarking

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // --log-level wins over RUST_LOG
    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    cli::run(args)
}
