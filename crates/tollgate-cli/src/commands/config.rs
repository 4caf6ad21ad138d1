use anyhow::{Context, Result};
use colored::Colorize;
use tollgate_auth::config::loader::{DEFAULT_CONFIG_FILE, load_config};

use crate::cli::OutputFormat;
use crate::output::{print_json, print_success};

pub fn check(path: Option<&str>, format: OutputFormat) -> Result<()> {
    let source = path.unwrap_or(DEFAULT_CONFIG_FILE);
    let config = load_config(path).with_context(|| format!("Invalid config {source}"))?;

    match format {
        OutputFormat::Json => print_json(&config)?,
        OutputFormat::Table => {
            let global = config
                .global_policies
                .as_ref()
                .map(|p| p.join("|"))
                .unwrap_or_else(|| "(implicit Authenticated)".to_string());
            println!("{}: {}", "Global policies".cyan(), global);
            println!(
                "{}: {}",
                "Read-only methods".cyan(),
                config.read_only_methods.join(", ")
            );
            println!("{}: {}", "Filter responses".cyan(), config.filter_responses);
            println!(
                "{}: {}",
                "Denied message".cyan(),
                config.denied_message.as_deref().unwrap_or("(default)")
            );
            println!("{}: {}", "Log level".cyan(), config.logging.level);
        }
    }
    print_success(&format!("Config {source} is valid"));
    Ok(())
}
