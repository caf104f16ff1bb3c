//! # Analytics CLI Binary
//!
//! Command-line interface for tracking and querying farm analytics data.

use anyhow::Result;
use clap::Parser;
use farm_analytics::cli::{Cli, CliHandler};
use farm_analytics::logging::initialize_logging_with_config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging_with_config(&cli.log_level, &cli.log_format)?;

    let config = cli.load_config()?;
    let handler = CliHandler::new(config).await?;

    handler.handle_command(cli.command).await?;

    Ok(())
}
