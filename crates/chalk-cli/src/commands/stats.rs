use std::path::Path;

use anyhow::Result;

use super::{load_config, open_memory};
use crate::output::format::format_stats;
use crate::output::OutputFormat;

pub fn run(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let memory = open_memory(&config);
    let summary = memory.summary();
    print!("{}", format_stats(&summary, &memory, format));
    Ok(())
}
