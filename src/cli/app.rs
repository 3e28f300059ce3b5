use super::commands::{AuthCommands, SyncCommands};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opsync")]
#[command(about = "Collects daily unit statistics from Dodo IS, Trendyol and Yemeksepeti")]
pub struct Cli {
    /// Dotenv file holding credentials (default: from settings, data/.env)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,
    /// Settings file (default: <config dir>/opsync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Log file, truncated on each run
    #[arg(long, global = true, default_value = "opsync.log")]
    pub log_file: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate and store daily statistics
    Sync(SyncCommands),
    /// Refresh the Dodo IS token and save the rotated refresh token
    Auth(AuthCommands),
}
