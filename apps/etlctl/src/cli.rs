use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "etlctl", version, about = "Experiment ETL operator CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a running etl-server to process a data directory.
    Trigger(TriggerArgs),
    /// Print the rows currently stored in derived_exp_data.
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct TriggerArgs {
    /// Base URL of etl-server (falls back to ETL_API_URL).
    #[arg(long)]
    pub api_url: Option<String>,
    #[arg(long, default_value = "data/")]
    pub path_to_data: String,
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[arg(long)]
    pub database_url: Option<String>,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
