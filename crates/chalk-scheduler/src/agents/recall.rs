use std::sync::Arc;

use chalk_core::memory::DEFAULT_SIMILAR_K;
use chalk_core::model::PROMPT_KEY;
use chalk_core::{Blackboard, MemoryStore};
use chalk_query::{RagStore, DEFAULT_CONTEXT_K};
use serde_json::{json, Value};

use crate::agent::{Agent, Readiness};
use crate::error::AgentError;

/// Looks up similar past runs and related documents for the prompt.
///
/// Produces `{similar, reuse_candidate, confidence, rag_context}`. The reuse
/// candidate is the closest past run whose prompt differs from this one.
pub struct RecallAgent {
    memory: Arc<MemoryStore>,
    rag: Arc<RagStore>,
    readiness: Readiness,
}

impl RecallAgent {
    pub const ID: &'static str = "memory";

    pub fn new(memory: Arc<MemoryStore>, rag: Arc<RagStore>) -> Self {
        Self {
            memory,
            rag,
            readiness: Readiness::new(Self::ID).requires([PROMPT_KEY]),
        }
    }
}

impl Agent for RecallAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    fn can_run(&self, state: &Blackboard) -> bool {
        self.readiness.is_ready(state)
    }

    fn run(&self, state: &Blackboard) -> Result<Value, AgentError> {
        let prompt = state
            .prompt()
            .ok_or_else(|| AgentError::failed("no prompt on the blackboard"))?;
        let similar = self.memory.similar_prompts(prompt, DEFAULT_SIMILAR_K);
        let rag_context = self.rag.contextualize(prompt, DEFAULT_CONTEXT_K);

        let candidate = similar.first().filter(|s| s.run.prompt != prompt);
        let prompt_len = prompt.chars().count();
        let confidence = match candidate {
            Some(c) if prompt_len > 0 => c.run.prompt.chars().count() as f64 / prompt_len as f64,
            _ => 0.0,
        };
        tracing::debug!(
            "Recalled {} similar runs, confidence {confidence:.2}",
            similar.len()
        );

        Ok(json!({
            "similar": similar,
            "reuse_candidate": candidate,
            "confidence": confidence,
            "rag_context": rag_context,
        }))
    }
}
