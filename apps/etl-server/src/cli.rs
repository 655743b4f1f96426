use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "etl-server",
    version,
    about = "Experiment summary ETL service"
)]
pub struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, default_value_t = 5000)]
    pub port: u16,
    #[arg(long, default_value_t = false)]
    pub print_openapi: bool,
    /// Load and transform PATH, print the summary as JSON and exit without touching the database.
    #[arg(long, value_name = "PATH")]
    pub dry_run: Option<String>,
}
