//! Learned-priority memory: per-agent success counters with a feedback bonus,
//! an append-only history of finished runs, and an audit log of decisions.
//!
//! Everything lives in one JSON document that is loaded once on open and fully
//! rewritten after every mutation. Write failures never propagate; the store
//! keeps working in memory and reports [`MemoryStore::persistence_degraded`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::model::{AgentRecord, Blackboard, Decision, Outcome, RunRecord};
use crate::storage;

/// Rate reported for agents with no history. Below 0.5 so that agents with a
/// proven record win once data exists.
pub const NEUTRAL_PRIOR: f64 = 0.3;
pub const MIN_RATE: f64 = 0.1;
pub const MAX_RATE: f64 = 1.0;
/// How strongly the feedback bonus moves the success rate.
pub const BONUS_WEIGHT: f64 = 0.2;
/// Multiplier applied to an existing bonus before each feedback share.
pub const BONUS_DECAY: f64 = 0.9;
pub const DEFAULT_BASELINE: f64 = 50.0;
/// Past runs returned by [`MemoryStore::similar_prompts`] when no limit is given.
pub const DEFAULT_SIMILAR_K: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MemoryData {
    #[serde(default)]
    past_runs: Vec<RunRecord>,
    #[serde(default)]
    agent_stats: BTreeMap<String, AgentRecord>,
    #[serde(default)]
    decisions: Vec<Decision>,
}

/// A past run together with its Jaccard similarity to a query prompt.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarRun {
    pub similarity: f64,
    #[serde(flatten)]
    pub run: RunRecord,
}

/// Aggregate view of the store.
#[derive(Debug, Clone, Serialize)]
pub struct MemorySummary {
    pub agents: BTreeMap<String, AgentRecord>,
    pub runs: usize,
    pub decisions: usize,
}

pub struct MemoryStore {
    path: Option<PathBuf>,
    data: Mutex<MemoryData>,
    degraded: AtomicBool,
}

impl MemoryStore {
    /// Open the store backed by `path`. A missing file starts empty; an
    /// unreadable one is logged and also starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match storage::load::<MemoryData>(&path) {
            Ok(Some(data)) => data,
            Ok(None) => MemoryData::default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable memory store {}: {e}", path.display());
                MemoryData::default()
            }
        };
        tracing::debug!(
            "Loaded memory store {} ({} agents, {} runs)",
            path.display(),
            data.agent_stats.len(),
            data.past_runs.len()
        );
        Self {
            path: Some(path),
            data: Mutex::new(data),
            degraded: AtomicBool::new(false),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(MemoryData::default()),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True once any write to disk has failed during this process.
    pub fn persistence_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &MemoryData) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = storage::save(path, data) {
            tracing::warn!("Failed to persist memory store {}: {e}", path.display());
            self.degraded.store(true, Ordering::Relaxed);
        }
    }

    fn mutate(&self, f: impl FnOnce(&mut MemoryData)) {
        let mut data = self.lock();
        f(&mut data);
        self.persist(&data);
    }

    // ---- Recording ----

    pub fn record_run(
        &self,
        prompt: &str,
        tech_stack: Vec<String>,
        artifacts: Vec<String>,
        score: f64,
    ) {
        let record = RunRecord::new(prompt, tech_stack, artifacts, score);
        self.mutate(|data| data.past_runs.push(record));
    }

    pub fn record_agent_invocation(&self, agent_id: &str, success: bool) {
        self.mutate(|data| {
            data.agent_stats
                .entry(agent_id.to_string())
                .or_default()
                .record(success)
        });
    }

    pub fn record_decision(&self, state: &Blackboard, chosen_agent: &str, outcome: Outcome) {
        let decision = Decision::new(state, chosen_agent, outcome);
        self.mutate(|data| data.decisions.push(decision));
    }

    // ---- Query ----

    /// Selection weight for an agent, always within `[0.1, 1.0]`.
    pub fn success_rate(&self, agent_id: &str) -> f64 {
        let data = self.lock();
        match data.agent_stats.get(agent_id) {
            None => NEUTRAL_PRIOR,
            Some(stats) => {
                let adjusted = stats.base_rate() + BONUS_WEIGHT * stats.score_bonus;
                adjusted.clamp(MIN_RATE, MAX_RATE)
            }
        }
    }

    pub fn agent_record(&self, agent_id: &str) -> Option<AgentRecord> {
        self.lock().agent_stats.get(agent_id).cloned()
    }

    /// Past runs ranked by Jaccard similarity of their prompt to `prompt`.
    pub fn similar_prompts(&self, prompt: &str, top_k: usize) -> Vec<SimilarRun> {
        let data = self.lock();
        let mut scored: Vec<SimilarRun> = data
            .past_runs
            .iter()
            .map(|run| SimilarRun {
                similarity: jaccard(prompt, &run.prompt),
                run: run.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(top_k);
        scored
    }

    pub fn past_runs(&self) -> Vec<RunRecord> {
        self.lock().past_runs.clone()
    }

    pub fn decisions(&self) -> Vec<Decision> {
        self.lock().decisions.clone()
    }

    pub fn summary(&self) -> MemorySummary {
        let data = self.lock();
        MemorySummary {
            agents: data.agent_stats.clone(),
            runs: data.past_runs.len(),
            decisions: data.decisions.len(),
        }
    }

    // ---- Feedback weighting ----

    /// Shift each agent's bonus by an equal share of how far `final_score`
    /// landed from `baseline`, after decaying the existing bonus.
    pub fn apply_feedback<S: AsRef<str>>(&self, agents: &[S], final_score: f64, baseline: f64) {
        if agents.is_empty() {
            return;
        }
        let delta = if baseline > 0.0 {
            ((final_score - baseline) / baseline).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let share = delta / agents.len() as f64;
        self.mutate(|data| {
            for agent in agents {
                let stats = data
                    .agent_stats
                    .entry(agent.as_ref().to_string())
                    .or_default();
                stats.score_bonus = (stats.score_bonus * BONUS_DECAY + share).clamp(-1.0, 1.0);
            }
        });
    }
}

/// Jaccard similarity of the lower-cased whitespace token sets. Zero when
/// either side is empty.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let sa: HashSet<&str> = a.split_whitespace().collect();
    let sb: HashSet<&str> = b.split_whitespace().collect();
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let shared = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_unseen_agent_gets_neutral_prior() {
        let store = MemoryStore::in_memory();
        assert!(approx(store.success_rate("X"), 0.3));
    }

    #[test]
    fn test_rate_from_counters() {
        let store = MemoryStore::in_memory();
        for _ in 0..3 {
            store.record_agent_invocation("X", true);
        }
        store.record_agent_invocation("X", false);
        assert!(approx(store.success_rate("X"), 0.75));
    }

    #[test]
    fn test_feedback_raises_rate() {
        let store = MemoryStore::in_memory();
        for _ in 0..3 {
            store.record_agent_invocation("X", true);
        }
        store.record_agent_invocation("X", false);
        store.apply_feedback(&["X"], 80.0, 50.0);
        assert!(approx(store.agent_record("X").unwrap().score_bonus, 0.6));
        assert!(approx(store.success_rate("X"), 0.87));
    }

    #[test]
    fn test_rate_is_clamped() {
        let store = MemoryStore::in_memory();
        store.record_agent_invocation("bad", false);
        store.apply_feedback(&["bad"], 0.0, 50.0);
        assert!(approx(store.success_rate("bad"), MIN_RATE));

        store.record_agent_invocation("good", true);
        store.apply_feedback(&["good"], 500.0, 50.0);
        assert!(approx(store.success_rate("good"), MAX_RATE));
    }

    #[test]
    fn test_feedback_only_agent_uses_bonus() {
        // Feedback for an agent that never ran creates a record with zero invocations
        let store = MemoryStore::in_memory();
        store.apply_feedback(&["ghost"], 100.0, 50.0);
        let record = store.agent_record("ghost").unwrap();
        assert_eq!(record.invocations, 0);
        assert!(approx(store.success_rate("ghost"), 0.2));
    }

    #[test]
    fn test_zero_delta_feedback_decays_geometrically() {
        let store = MemoryStore::in_memory();
        store.apply_feedback(&["X"], 100.0, 50.0);
        let mut expected = 1.0;
        assert!(approx(store.agent_record("X").unwrap().score_bonus, expected));
        for _ in 0..5 {
            store.apply_feedback(&["X"], 50.0, 50.0);
            expected *= 0.9;
            assert!(approx(store.agent_record("X").unwrap().score_bonus, expected));
        }
    }

    #[test]
    fn test_feedback_split_and_edge_cases() {
        let store = MemoryStore::in_memory();
        store.apply_feedback(&["a", "b"], 25.0, 50.0);
        assert!(approx(store.agent_record("a").unwrap().score_bonus, -0.25));
        assert!(approx(store.agent_record("b").unwrap().score_bonus, -0.25));

        let none: [&str; 0] = [];
        store.apply_feedback(&none, 100.0, 50.0);
        store.apply_feedback(&["c"], 100.0, 0.0);
        assert!(approx(store.agent_record("c").unwrap().score_bonus, 0.0));
    }

    #[test]
    fn test_similar_prompts() {
        let store = MemoryStore::in_memory();
        assert!(store.similar_prompts("anything", 3).is_empty());

        store.record_run("Build a blog API", vec!["fastapi".into()], vec![], 70.0);
        store.record_run("chat server in rust", vec![], vec![], 40.0);
        store.record_run("", vec![], vec![], 0.0);

        let similar = store.similar_prompts("build a BLOG", 2);
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].run.prompt, "Build a blog API");
        assert!(approx(similar[0].similarity, 0.75));
        for s in store.similar_prompts("build a blog", 10) {
            assert!((0.0..=1.0).contains(&s.similarity));
        }
    }

    #[test]
    fn test_jaccard_bounds() {
        assert!(approx(jaccard("a b", "a b"), 1.0));
        assert!(approx(jaccard("a", "b"), 0.0));
        assert!(approx(jaccard("", "b"), 0.0));
        assert!(approx(jaccard("   ", "   "), 0.0));
    }

    #[test]
    fn test_decisions_are_appended() {
        let store = MemoryStore::in_memory();
        let board = Blackboard::seeded("p", "n");
        store.record_decision(&board, "memory", Outcome::Success);
        store.record_decision(&board, "codegen", Outcome::Failure);
        let decisions = store.decisions();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[1].chosen_agent, "codegen");
        assert_eq!(decisions[1].outcome, Outcome::Failure);
        assert_eq!(store.summary().decisions, 2);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("memory.json");
        {
            let store = MemoryStore::open(&path);
            store.record_agent_invocation("codegen", true);
            store.apply_feedback(&["codegen"], 90.0, 50.0);
            store.record_run("api", vec!["axum".into()], vec!["src/main.rs".into()], 90.0);
            assert!(!store.persistence_degraded());
        }
        let reopened = MemoryStore::open(&path);
        let record = reopened.agent_record("codegen").unwrap();
        assert_eq!(record.invocations, 1);
        assert!(approx(record.score_bonus, 0.8));
        assert_eq!(reopened.past_runs()[0].artifacts, vec!["src/main.rs"]);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("past_runs").is_some());
        assert!(raw.get("agent_stats").is_some());
        assert!(raw.get("decisions").is_some());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("memory.json");
        std::fs::write(&path, "[[[").unwrap();
        let store = MemoryStore::open(&path);
        assert_eq!(store.summary().runs, 0);
        assert!(approx(store.success_rate("anyone"), NEUTRAL_PRIOR));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be makes every save fail
        let store = MemoryStore::open(tmp.path());
        store.record_agent_invocation("x", true);
        assert!(store.persistence_degraded());
        assert_eq!(store.agent_record("x").unwrap().successes, 1);
    }
}
