//! nvenc-capacity CLI
//!
//! Runs one dual-NVENC concurrent capacity test and exits 0 only on PASS.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use nvenc_capacity::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Run the test
    cli.run().await
}
