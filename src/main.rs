//! sha1bench - SHA-1 chunk hashing benchmark
//!
//! Entry point for the transmitter, receiver and offline tools.

mod cli;

use clap::Parser;
use cli::Args;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging; report lines own stdout
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    cli::run(args)
}
