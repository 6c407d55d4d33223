use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "chalk",
    version,
    about = "Run blackboard agent pipelines that learn which agents to trust"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    /// Config file (defaults to ./chalk.toml when present)
    #[arg(long, global = true, env = "CHALK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    match &cli.command {
        commands::Commands::Init(args) => commands::init::run(args),
        commands::Commands::Run(args) => commands::run::run(args, config, cli.format),
        commands::Commands::Stats => commands::stats::run(config, cli.format),
        commands::Commands::Similar(args) => commands::similar::run(args, config, cli.format),
        commands::Commands::Ingest(args) => commands::ingest::run(args, config, cli.format),
        commands::Commands::Search(args) => commands::search::run(args, config, cli.format),
        commands::Commands::Context(args) => commands::context::run(args, config, cli.format),
        commands::Commands::Reset(args) => commands::reset::run(args, config),
    }
}
