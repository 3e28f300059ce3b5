use clap::Args;

#[derive(Args)]
pub struct AuthCommands {
    /// Only show whether the stored credentials are present
    #[arg(long)]
    pub check: bool,
}
