use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use opsync::cli::{Cli, Commands};
use opsync::commands::{AppContext, auth_command, sync_command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&cli.log_file)
        .with_context(|| format!("Failed to open log file: {}", cli.log_file.display()))?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    info!("Starting opsync");
    let context = AppContext::load(cli.config.as_deref(), cli.env_file)?;

    let run = async {
        match cli.command {
            Commands::Sync(args) => sync_command(&context, args).await,
            Commands::Auth(args) => auth_command(&context, args).await,
        }
    };

    tokio::select! {
        result = run => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            anyhow::bail!("Interrupted before completion");
        }
    }
}
