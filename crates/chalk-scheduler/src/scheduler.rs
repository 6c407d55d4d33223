use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use chalk_core::config::{ChalkConfig, KeySettings, SchedulerSettings, SummarySettings};
use chalk_core::model::{ANSWERS_KEY, CONFIG_KEY};
use chalk_core::{Blackboard, MemoryStore, Outcome};

use crate::agent::{Agent, AgentRegistry, KeyMap};
use crate::error::AgentError;
use crate::halt::{self, score_at, HaltCondition, ScoreGate};

pub const STALL_MESSAGE: &str = "No more agents can run. Stopping.";

/// Input to a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub prompt: String,
    pub name: String,
    /// Toggles passed through to agents untouched.
    pub config: Value,
    pub answers: Option<Value>,
}

impl RunRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            name: "project".to_string(),
            config: Value::Object(Default::default()),
            answers: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn answers(mut self, answers: Value) -> Self {
        self.answers = Some(answers);
        self
    }

    fn seed(&self) -> Blackboard {
        let mut state = Blackboard::seeded(&self.prompt, &self.name);
        // Neither key is reserved, so these writes cannot fail.
        let _ = state.insert(CONFIG_KEY, self.config.clone());
        if let Some(answers) = &self.answers {
            let _ = state.insert(ANSWERS_KEY, answers.clone());
        }
        state
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The halt condition was met.
    Completed,
    /// No agent was ready.
    Stalled,
    /// The tick cap was reached first.
    CapReached,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Stalled => write!(f, "stalled"),
            Self::CapReached => write!(f, "cap reached"),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub state: Blackboard,
    pub log: Vec<String>,
    pub status: RunStatus,
    pub score: f64,
    /// Agents invoked, de-duplicated in first-use order.
    pub agents_used: Vec<String>,
    pub ticks: usize,
    /// True when the memory store could not save some of this run.
    pub persistence_degraded: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Picks one ready agent per tick by learned success rate plus a stage
/// bonus, merges its output, and learns from the final score.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use chalk_core::MemoryStore;
/// use chalk_scheduler::{halt::Never, AgentRegistry, RunRequest, Scheduler};
///
/// let registry = AgentRegistry::new();
/// let memory = Arc::new(MemoryStore::open(".chalk/memory.json"));
/// let mut scheduler = Scheduler::new(registry, memory);
/// scheduler.max_ticks(10).halt_when(Never);
/// let outcome = scheduler.run(RunRequest::new("todo app with auth"));
/// println!("{} after {} ticks", outcome.status, outcome.ticks);
/// ```
pub struct Scheduler {
    registry: AgentRegistry,
    memory: Arc<MemoryStore>,
    keys: KeyMap,
    halt: Box<dyn HaltCondition>,
    settings: SchedulerSettings,
    summary: SummarySettings,
}

impl Scheduler {
    /// A scheduler with default settings and the default score gate.
    pub fn new(registry: AgentRegistry, memory: Arc<MemoryStore>) -> Self {
        Self {
            registry,
            memory,
            keys: KeyMap::from(&KeySettings::default()),
            halt: Box::new(ScoreGate::default()),
            settings: SchedulerSettings::default(),
            summary: SummarySettings::default(),
        }
    }

    pub fn from_config(
        registry: AgentRegistry,
        memory: Arc<MemoryStore>,
        config: &ChalkConfig,
    ) -> Self {
        Self {
            registry,
            memory,
            keys: KeyMap::from(&config.keys),
            halt: halt::from_settings(&config.halt),
            settings: config.scheduler.clone(),
            summary: config.summary.clone(),
        }
    }

    pub fn max_ticks(&mut self, max_ticks: usize) -> &mut Self {
        self.settings.max_ticks = max_ticks;
        self
    }

    pub fn halt_when(&mut self, condition: impl HaltCondition + 'static) -> &mut Self {
        self.halt = Box::new(condition);
        self
    }

    pub fn key_map(&mut self, keys: KeyMap) -> &mut Self {
        self.keys = keys;
        self
    }

    pub fn stage_order<I, S>(&mut self, order: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.stage_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn stage_weight(&mut self, weight: f64) -> &mut Self {
        self.settings.stage_weight = weight;
        self
    }

    pub fn first_run_boost(&mut self, agent_id: impl Into<String>, boost: f64) -> &mut Self {
        self.settings.first_run_boost.insert(agent_id.into(), boost);
        self
    }

    pub fn feedback_baseline(&mut self, baseline: f64) -> &mut Self {
        self.settings.feedback_baseline = baseline;
        self
    }

    pub fn summary_paths(&mut self, summary: SummarySettings) -> &mut Self {
        self.summary = summary;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Bonus for agents early in the canonical stage order; 0 for agents
    /// outside it.
    pub fn stage_bonus(&self, agent_id: &str) -> f64 {
        let order = &self.settings.stage_order;
        match order.iter().position(|id| id == agent_id) {
            Some(pos) => {
                let len = order.len() as f64;
                self.settings.stage_weight * (len - pos as f64) / len
            }
            None => 0.0,
        }
    }

    /// Selection score for `agent_id` given the current blackboard.
    pub fn priority(&self, agent_id: &str, state: &Blackboard) -> f64 {
        let mut score = self.memory.success_rate(agent_id) + self.stage_bonus(agent_id);
        if let Some(boost) = self.settings.first_run_boost.get(agent_id) {
            if !state.contains(self.keys.key_for(agent_id)) {
                score += boost;
            }
        }
        score
    }

    /// Highest-priority ready agent; the earliest registered wins ties.
    fn select(&self, state: &Blackboard) -> Option<&dyn Agent> {
        let mut best: Option<(&dyn Agent, f64)> = None;
        for agent in self.registry.iter() {
            if !agent.can_run(state) {
                continue;
            }
            let score = self.priority(agent.id(), state);
            tracing::trace!("Candidate {} scored {score:.4}", agent.id());
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((agent, score)),
            }
        }
        best.map(|(agent, _)| agent)
    }

    /// Drive the blackboard until the halt condition holds, nothing is ready,
    /// or the tick cap is reached. Agent failures are recorded, never raised.
    pub fn run(&self, request: RunRequest) -> RunOutcome {
        let started_at = Utc::now();
        let mut state = request.seed();
        let mut log = Vec::new();
        let mut invoked: Vec<String> = Vec::new();
        let mut status = RunStatus::CapReached;
        let mut ticks = 0;

        tracing::info!(
            "Starting run {} with {} agents (cap {})",
            request.name,
            self.registry.len(),
            self.settings.max_ticks
        );

        while ticks < self.settings.max_ticks {
            let Some(agent) = self.select(&state) else {
                tracing::info!("{STALL_MESSAGE}");
                log.push(STALL_MESSAGE.to_string());
                status = RunStatus::Stalled;
                break;
            };
            let id = agent.id();
            tracing::info!("Running agent: {id}");
            log.push(format!("Running agent: {id}"));

            let merged = invoke(agent, &state).and_then(|value| {
                state
                    .insert(self.keys.key_for(id), value)
                    .map_err(|e| AgentError::failed(e.to_string()))
            });
            let success = match merged {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Agent {id} error: {e}");
                    log.push(format!("Agent {id} error: {e}"));
                    false
                }
            };
            self.memory.record_agent_invocation(id, success);
            self.memory
                .record_decision(&state, id, Outcome::from_success(success));
            invoked.push(id.to_string());
            ticks += 1;

            if self.halt.should_halt(&state) {
                if let Some(message) = self.halt.halt_message(&state) {
                    log.push(message);
                }
                status = RunStatus::Completed;
                break;
            }
        }

        if status == RunStatus::CapReached {
            tracing::warn!("Run {} stopped at the {ticks} tick cap", request.name);
        }
        self.finish(request, state, log, status, &invoked, ticks, started_at)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        request: RunRequest,
        state: Blackboard,
        log: Vec<String>,
        status: RunStatus,
        invoked: &[String],
        ticks: usize,
        started_at: DateTime<Utc>,
    ) -> RunOutcome {
        let tech_stack = names_at(&state, &self.summary.tech_stack);
        let artifacts = names_at(&state, &self.summary.artifacts);
        let score = score_at(&state, &self.summary.score);
        self.memory
            .record_run(&request.prompt, tech_stack, artifacts, score);

        let mut agents_used: Vec<String> = Vec::new();
        for id in invoked {
            if !agents_used.contains(id) {
                agents_used.push(id.clone());
            }
        }
        self.memory
            .apply_feedback(&agents_used, score, self.settings.feedback_baseline);

        tracing::info!("Run {} {status} after {ticks} ticks, score {score}", request.name);
        RunOutcome {
            state,
            log,
            status,
            score,
            agents_used,
            ticks,
            persistence_degraded: self.memory.persistence_degraded(),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Run one agent, turning a panic into an ordinary failure.
fn invoke(agent: &dyn Agent, state: &Blackboard) -> Result<Value, AgentError> {
    match panic::catch_unwind(AssertUnwindSafe(|| agent.run(state))) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(AgentError::failed(format!("panicked: {msg}")))
        }
    }
}

/// Strings at a dotted path. Objects contribute their `name` or `path` field.
fn names_at(state: &Blackboard, path: &str) -> Vec<String> {
    let Some(Value::Array(items)) = state.lookup(path) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("name")
                .or_else(|| map.get("path"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halt::Never;
    use serde_json::json;

    struct Fixed {
        id: &'static str,
        value: Value,
    }

    impl Agent for Fixed {
        fn id(&self) -> &str {
            self.id
        }
        fn can_run(&self, state: &Blackboard) -> bool {
            !state.contains(self.id)
        }
        fn run(&self, _state: &Blackboard) -> Result<Value, AgentError> {
            Ok(self.value.clone())
        }
    }

    fn scheduler(agents: Vec<Fixed>) -> Scheduler {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(agent).unwrap();
        }
        Scheduler::new(registry, Arc::new(MemoryStore::in_memory()))
    }

    #[test]
    fn test_stage_bonus() {
        let s = scheduler(Vec::new());
        assert!((s.stage_bonus("memory") - 0.2).abs() < 1e-9);
        assert!((s.stage_bonus("package") - 0.2 / 21.0).abs() < 1e-9);
        assert_eq!(s.stage_bonus("custom"), 0.0);
    }

    #[test]
    fn test_priority_applies_first_run_boost_until_produced() {
        let s = scheduler(Vec::new());
        let mut state = Blackboard::seeded("p", "n");
        let fresh = s.priority("clarify", &state);
        state.insert("clarify", json!({})).unwrap();
        let done = s.priority("clarify", &state);
        assert!((fresh - done - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_selection_prefers_earlier_stage() {
        let mut s = scheduler(vec![
            Fixed {
                id: "package",
                value: json!({}),
            },
            Fixed {
                id: "memory",
                value: json!({}),
            },
        ]);
        s.halt_when(Never);
        let outcome = s.run(RunRequest::new("p"));
        assert_eq!(outcome.agents_used, vec!["memory", "package"]);
        assert_eq!(outcome.status, RunStatus::Stalled);
        assert_eq!(outcome.log.last().unwrap(), STALL_MESSAGE);
    }

    #[test]
    fn test_summary_extraction() {
        let s = scheduler(vec![
            Fixed {
                id: "tech",
                value: json!({"stack": ["fastapi", {"name": "postgres"}, 3]}),
            },
            Fixed {
                id: "codegen",
                value: json!({"files": [{"path": "main.py"}, "README.md"]}),
            },
            Fixed {
                id: "evaluate",
                value: json!({"score": 70}),
            },
        ]);
        let outcome = s.run(RunRequest::new("api with auth"));
        assert_eq!(outcome.score, 70.0);

        let runs = s.memory().past_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].tech_stack, vec!["fastapi", "postgres"]);
        assert_eq!(runs[0].artifacts, vec!["main.py", "README.md"]);
        assert_eq!(runs[0].score, 70.0);
    }

    #[test]
    fn test_request_seeds_state() {
        let request = RunRequest::new("p")
            .name("demo")
            .config(json!({"boilerplate_only": true}))
            .answers(json!({"db": "sqlite"}));
        let state = request.seed();
        assert_eq!(state.name(), Some("demo"));
        assert!(state.config_flag("boilerplate_only"));
        assert_eq!(state.lookup("answers.db"), Some(&json!("sqlite")));
    }
}
