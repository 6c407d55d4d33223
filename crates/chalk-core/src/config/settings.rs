use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::AgentId;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "chalk.toml";

const DEFAULT_STAGE_ORDER: &[&str] = &[
    "memory",
    "clarify",
    "tech_select",
    "architecture",
    "arch_validate",
    "arch_expand",
    "scaffold",
    "codegen",
    "manifest",
    "validate",
    "database",
    "deploy_select",
    "infra",
    "compose",
    "kube",
    "tests",
    "quickstart",
    "ingest",
    "evaluate",
    "remediate",
    "package",
];

/// Full configuration, read from `chalk.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChalkConfig {
    pub scheduler: SchedulerSettings,
    pub halt: HaltSettings,
    /// Agent id → blackboard key, for agents whose output lives elsewhere.
    pub keys: KeySettings,
    pub summary: SummarySettings,
    pub stores: StoreSettings,
    /// External command agents.
    pub agents: Vec<CommandAgentSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Hard cap on ticks; the only unconditional termination guarantee.
    pub max_ticks: usize,
    /// Canonical pipeline order used for the stage bonus.
    pub stage_order: Vec<String>,
    pub stage_weight: f64,
    /// Extra priority an agent gets while its output key is still absent.
    pub first_run_boost: BTreeMap<String, f64>,
    pub feedback_baseline: f64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_ticks: 30,
            stage_order: DEFAULT_STAGE_ORDER.iter().map(|s| s.to_string()).collect(),
            stage_weight: 0.2,
            first_run_boost: BTreeMap::from([("clarify".to_string(), 2.0)]),
            feedback_baseline: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaltSettings {
    /// Halt once scored, finalized and good enough (or remediated).
    pub score_gate: bool,
    pub score_path: String,
    pub final_key: String,
    pub threshold: f64,
    pub remediation_key: Option<String>,
    /// Halt when `state[key][field]` is non-empty.
    pub field_gates: Vec<FieldGateSettings>,
}

impl Default for HaltSettings {
    fn default() -> Self {
        Self {
            score_gate: true,
            score_path: "evaluate.score".into(),
            final_key: "package".into(),
            threshold: 65.0,
            remediation_key: Some("remediate".into()),
            field_gates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldGateSettings {
    pub key: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeySettings(pub BTreeMap<String, String>);

impl Default for KeySettings {
    fn default() -> Self {
        Self(BTreeMap::from([("tech_select".to_string(), "tech".to_string())]))
    }
}

/// Dotted paths used to distill the final blackboard into a run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    pub tech_stack: String,
    pub artifacts: String,
    pub score: String,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            tech_stack: "tech.stack".into(),
            artifacts: "codegen.files".into(),
            score: "evaluate.score".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub memory: PathBuf,
    pub rag: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            memory: PathBuf::from(".chalk/memory.json"),
            rag: PathBuf::from(".chalk/rag.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAgentSettings {
    pub id: String,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Keys that must be present before the agent is ready.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Key that makes the agent ready again when written after its output.
    #[serde(default)]
    pub redo_flag: Option<String>,
    /// Config toggle that disables the agent when set to `true`.
    #[serde(default)]
    pub skip_if: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl ChalkConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `chalk.toml` in the working directory if it
    /// exists, else the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, CoreError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.scheduler.max_ticks == 0 {
            return Err(CoreError::Config("scheduler.max_ticks must be at least 1".into()));
        }
        if !self.scheduler.stage_weight.is_finite() {
            return Err(CoreError::Config("scheduler.stage_weight must be finite".into()));
        }
        if let Some((id, _)) = self
            .scheduler
            .first_run_boost
            .iter()
            .find(|(_, boost)| !boost.is_finite())
        {
            return Err(CoreError::Config(format!(
                "scheduler.first_run_boost.{id} must be finite"
            )));
        }
        for agent in &self.agents {
            AgentId::parse(agent.id.as_str())?;
            if agent.command.is_empty() {
                return Err(CoreError::Config(format!(
                    "agent {} has an empty command",
                    agent.id
                )));
            }
        }
        Ok(())
    }
}
