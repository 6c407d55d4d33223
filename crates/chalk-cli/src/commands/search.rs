use std::path::Path;

use anyhow::Result;
use chalk_query::DEFAULT_TOP_K;
use clap::Args;

use super::{load_config, open_rag};
use crate::output::format::format_search_results;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct SearchArgs {
    /// Free-text query
    pub query: String,

    /// Maximum number of results
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_K)]
    pub limit: usize,
}

pub fn run(args: &SearchArgs, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let results = open_rag(&config).similarity(&args.query, args.limit);

    if results.is_empty() {
        eprintln!("No results found for: {}", args.query);
        if matches!(format, OutputFormat::Json) {
            println!("[]");
        }
        return Ok(());
    }

    if !matches!(format, OutputFormat::Json) {
        eprintln!("Found {} result(s) for: {}\n", results.len(), args.query);
    }
    print!("{}", format_search_results(&results, format));
    Ok(())
}
