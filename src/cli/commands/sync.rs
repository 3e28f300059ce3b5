use clap::Args;

#[derive(Args)]
pub struct SyncCommands {
    /// Most recent day to aggregate, counted back from today
    #[arg(long, default_value_t = 0)]
    pub days_back: u32,
    /// Number of consecutive days to aggregate, going further back
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub range: u32,
    /// Aggregate and print the run report without writing to the database
    #[arg(long)]
    pub dry_run: bool,
}
