//! Splice CLI - Command-line interface
//!
//! Runs simulated segment layouts through the media source reader.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use splice_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "splice")]
#[command(about = "Segmented media source reader simulator")]
struct Cli {
    /// Console log level; the full trace always goes to the log file
    #[arg(long, value_enum, default_value_t = CliLogLevel::Warn, global = true)]
    log_level: CliLogLevel,
    /// Directory for the trace log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing: {error}"))?;

    commands::handle_command(cli.command).await
}
