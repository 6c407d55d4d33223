use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use super::{load_config, open_rag};
use crate::output::OutputFormat;

#[derive(Args)]
pub struct IngestArgs {
    /// File to index
    pub file: PathBuf,

    /// Document id (defaults to the file path)
    #[arg(long)]
    pub id: Option<String>,
}

pub fn run(args: &IngestArgs, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let rag = open_rag(&config);
    let id = rag
        .add_file(&args.file, args.id.as_deref())
        .with_context(|| format!("Failed to index {}", args.file.display()))?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "doc_id": id,
                "documents": rag.len(),
                "saved": !rag.persistence_degraded(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text | OutputFormat::Markdown => {
            println!("Indexed {id} ({} documents)", rag.len());
        }
    }
    if rag.persistence_degraded() {
        eprintln!("Warning: the document index could not be saved.");
    }
    Ok(())
}
