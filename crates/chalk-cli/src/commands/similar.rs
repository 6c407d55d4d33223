use std::path::Path;

use anyhow::Result;
use chalk_core::memory::DEFAULT_SIMILAR_K;
use clap::Args;

use super::{load_config, open_memory};
use crate::output::format::format_similar;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct SimilarArgs {
    /// Prompt to compare against past runs
    pub prompt: String,

    /// Maximum number of runs
    #[arg(short = 'n', long, default_value_t = DEFAULT_SIMILAR_K)]
    pub limit: usize,
}

pub fn run(args: &SimilarArgs, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let runs = open_memory(&config).similar_prompts(&args.prompt, args.limit);
    print!("{}", format_similar(&runs, format));
    Ok(())
}
