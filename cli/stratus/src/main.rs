//! stratus - operator tooling for the cloud test harness.
//!
//! Connects to the cloud under test with the conventional `OS_*`
//! environment variables and exposes the harness's readiness probe,
//! server listing, and leaked-resource cleanup.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }

    Ok(())
}
