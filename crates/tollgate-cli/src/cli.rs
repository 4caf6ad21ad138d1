use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tollgate")]
#[command(about = "Tollgate CLI: lint and summarize route authorization")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Authorization config file (defaults to ./tollgate.toml when present)
    #[arg(short, long, global = true, env = "TOLLGATE_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check policy registrations and summarize the policies of every route
    Analyze(AnalyzeArgs),
    /// Load and validate the authorization config
    CheckConfig,
}

#[derive(clap::Args)]
pub struct AnalyzeArgs {
    /// Route manifest (JSON)
    #[arg(short, long)]
    pub manifest: String,
    /// Exit with an error when any route has warnings
    #[arg(long)]
    pub strict: bool,
}
