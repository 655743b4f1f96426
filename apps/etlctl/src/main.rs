mod cli;
mod config;
mod trigger;
mod validate;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Trigger(args) => trigger::handle(args),
        Commands::Validate(args) => validate::handle(args),
    }
}
