use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use super::load_config;

#[derive(Args)]
pub struct ResetArgs {
    /// Only delete the learned memory
    #[arg(long)]
    pub memory: bool,

    /// Only delete the document index
    #[arg(long)]
    pub rag: bool,
}

pub fn run(args: &ResetArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let both = !args.memory && !args.rag;

    let mut targets = Vec::new();
    if args.memory || both {
        targets.push(config.stores.memory.as_path());
    }
    if args.rag || both {
        targets.push(config.stores.rag.as_path());
    }

    let mut removed = 0;
    for path in targets {
        if !path.exists() {
            continue;
        }
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        println!("Removed {}", path.display());
        removed += 1;
    }
    if removed == 0 {
        println!("Nothing to remove.");
    }
    Ok(())
}
