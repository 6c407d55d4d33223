use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chalk_scheduler::{agents, RunRequest, Scheduler};
use clap::Args;
use serde_json::{Map, Value};

use super::{load_config, open_memory, open_rag};
use crate::output::format::format_outcome;
use crate::output::OutputFormat;

#[derive(Args)]
pub struct RunArgs {
    /// What to build
    pub prompt: String,

    /// Run name, stored on the blackboard
    #[arg(long, default_value = "project")]
    pub name: String,

    /// Answers to earlier clarification questions, as a JSON object
    #[arg(long)]
    pub answers: Option<String>,

    /// Config toggle to set to true (repeatable), e.g. boilerplate_only
    #[arg(long = "toggle", value_name = "NAME")]
    pub toggles: Vec<String>,

    /// Directory agents work in
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,

    /// Override the configured tick cap
    #[arg(long)]
    pub max_ticks: Option<usize>,

    /// Also write a Markdown run report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub fn run(args: &RunArgs, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let memory = Arc::new(open_memory(&config));
    let rag = Arc::new(open_rag(&config));

    let registry =
        agents::standard_registry(&config, Arc::clone(&memory), rag, &args.project_root)
            .context("Failed to set up agents")?;
    let mut scheduler = Scheduler::from_config(registry, memory, &config);
    if let Some(max_ticks) = args.max_ticks {
        if max_ticks == 0 {
            anyhow::bail!("--max-ticks must be at least 1");
        }
        scheduler.max_ticks(max_ticks);
    }

    let toggles: Map<String, Value> = args
        .toggles
        .iter()
        .map(|t| (t.clone(), Value::Bool(true)))
        .collect();
    let mut request = RunRequest::new(&args.prompt)
        .name(&args.name)
        .config(Value::Object(toggles));
    if let Some(raw) = &args.answers {
        let answers: Value = serde_json::from_str(raw).context("--answers is not valid JSON")?;
        if !answers.is_object() {
            anyhow::bail!("--answers must be a JSON object");
        }
        request = request.answers(answers);
    }

    let outcome = scheduler.run(request);
    print!("{}", format_outcome(&outcome, format));

    if let Some(path) = &args.report {
        outcome
            .write_report(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        eprintln!("Report written to {}", path.display());
    }
    if outcome.persistence_degraded {
        eprintln!("Warning: learned memory could not be saved for this run.");
    }
    Ok(())
}
