use std::path::Path;

use anyhow::Result;
use chalk_query::DEFAULT_CONTEXT_K;
use clap::Args;

use super::{load_config, open_rag};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct ContextArgs {
    /// Free-text query
    pub query: String,

    /// Maximum number of documents
    #[arg(short = 'n', long, default_value_t = DEFAULT_CONTEXT_K)]
    pub limit: usize,
}

pub fn run(args: &ContextArgs, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let context = open_rag(&config).contextualize(&args.query, args.limit);

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "query": args.query, "context": context });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text | OutputFormat::Markdown => {
            if !context.is_empty() {
                println!("{context}");
            }
        }
    }
    Ok(())
}
