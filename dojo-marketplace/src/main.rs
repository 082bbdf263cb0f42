//! Dojo Marketplace CLI.
//!
//! This is the entry point for the `dojo-marketplace` binary, which:
//! - Loads configuration from TOML and the environment
//! - Initializes logging on stderr
//! - Runs the install or uninstall command

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use dojo_marketplace::config::MarketplaceConfig;
use dojo_marketplace::marketplace::{self, MarketplaceCommand};

/// Install skills, plugins and tools from the Dojo marketplace
#[derive(Parser, Debug)]
#[command(name = "dojo-marketplace")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run in verbose mode (debug logging)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: MarketplaceCommand,
}

/// Environment variable holding the log filter.
const LOG_LEVEL_ENV: &str = "DOJO_LOG_LEVEL";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };

    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    let config = MarketplaceConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;
    debug!(api_base_url = %config.api_base_url, "Configuration loaded");

    let succeeded = marketplace::execute(args.command, &config)
        .await
        .context("Marketplace command failed")?;

    if succeeded {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("Command completed without success");
        Ok(ExitCode::FAILURE)
    }
}
