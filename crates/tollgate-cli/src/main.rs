mod cli;
mod commands;
mod manifest;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;
use tollgate_auth::config::loader::load_config;

use cli::{Cli, Commands};
use output::print_error;

fn main() {
    if let Err(e) = run() {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Analyze(args) => {
            let config = load_config(cli.config.as_deref())?;
            observability::init_tracing_with_level(&config.logging.level);
            commands::analyze::run(args, config, format)?;
        }
        Commands::CheckConfig => {
            observability::init_tracing();
            commands::config::check(cli.config.as_deref(), format)?;
        }
    }
    Ok(())
}
