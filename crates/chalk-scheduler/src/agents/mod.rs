//! Agents that ship with the scheduler.

mod command;
mod ingest;
mod recall;

use std::path::Path;
use std::sync::Arc;

use chalk_core::{ChalkConfig, MemoryStore};
use chalk_query::RagStore;

pub use command::{CommandAgent, CommandOutput, CommandRunner, SystemCommandRunner};
pub use ingest::IngestAgent;
pub use recall::RecallAgent;

use crate::agent::{AgentRegistry, KeyMap};
use crate::error::SchedulerError;

/// The recall agent, every configured command agent, then the ingest agent.
///
/// Built-in agents are skipped when a command agent already uses their id.
pub fn standard_registry(
    config: &ChalkConfig,
    memory: Arc<MemoryStore>,
    rag: Arc<RagStore>,
    project_root: &Path,
) -> Result<AgentRegistry, SchedulerError> {
    let keys = KeyMap::from(&config.keys);
    let overridden = |id: &str| config.agents.iter().any(|a| a.id == id);

    let mut registry = AgentRegistry::new();
    if !overridden(RecallAgent::ID) {
        registry.register(RecallAgent::new(memory, Arc::clone(&rag)))?;
    }
    for settings in &config.agents {
        let mut agent = CommandAgent::from_settings(settings, keys.key_for(&settings.id))?;
        if settings.working_dir.is_none() {
            agent = agent.working_dir(project_root);
        }
        registry.register(agent)?;
    }
    if !overridden(IngestAgent::ID) {
        registry.register(IngestAgent::new(project_root, rag))?;
    }
    Ok(registry)
}
