use std::path::Path;

use anyhow::{Context, Result};
use chalk_core::config::DEFAULT_CONFIG_FILE;
use chalk_core::ChalkConfig;
use clap::Args;

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs) -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() && !args.force {
        println!("{DEFAULT_CONFIG_FILE} already exists.");
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    let rendered =
        toml::to_string_pretty(&ChalkConfig::default()).context("Failed to render config")?;
    std::fs::write(path, rendered)
        .with_context(|| format!("Failed to write {DEFAULT_CONFIG_FILE}"))?;

    println!("Wrote {DEFAULT_CONFIG_FILE}.");
    println!();
    println!("Next steps:");
    println!("  Add [[agents]] entries for your command agents");
    println!("  chalk run \"<prompt>\"          Run the pipeline");
    println!("  chalk stats                   See what it has learned");
    Ok(())
}
