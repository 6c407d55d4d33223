pub mod context;
pub mod ingest;
pub mod init;
pub mod reset;
pub mod run;
pub mod search;
pub mod similar;
pub mod stats;

use std::path::Path;

use anyhow::{Context, Result};
use chalk_core::{ChalkConfig, MemoryStore};
use chalk_query::RagStore;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default chalk.toml in the current directory
    Init(init::InitArgs),
    /// Run the agent pipeline for a prompt
    Run(run::RunArgs),
    /// Show learned agent statistics
    Stats,
    /// List past runs with similar prompts
    Similar(similar::SimilarArgs),
    /// Add a file to the document index
    Ingest(ingest::IngestArgs),
    /// Search the document index
    Search(search::SearchArgs),
    /// Print retrieval context for a query
    Context(context::ContextArgs),
    /// Delete the learned memory and/or the document index
    Reset(reset::ResetArgs),
}

pub fn load_config(path: Option<&Path>) -> Result<ChalkConfig> {
    let config = ChalkConfig::discover(path).context("Failed to load configuration")?;
    Ok(config)
}

pub fn open_memory(config: &ChalkConfig) -> MemoryStore {
    MemoryStore::open(&config.stores.memory)
}

pub fn open_rag(config: &ChalkConfig) -> RagStore {
    RagStore::open(&config.stores.rag)
}
