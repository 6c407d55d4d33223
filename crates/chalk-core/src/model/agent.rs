use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identifier of an agent, also its default blackboard key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// Parse and validate an ID string. Must be non-empty, without whitespace or dots.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(CoreError::InvalidId("ID must not be empty".into()));
        }
        if s.chars().any(|c| c.is_whitespace() || c == '.') {
            return Err(CoreError::InvalidId(format!(
                "ID must not contain whitespace or '.', got {s:?}"
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Learned statistics for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    /// Feedback weighting in `[-1, 1]`.
    #[serde(default)]
    pub score_bonus: f64,
}

impl AgentRecord {
    pub fn record(&mut self, success: bool) {
        self.invocations += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
    }

    /// Plain success ratio, ignoring feedback.
    pub fn base_rate(&self) -> f64 {
        self.successes as f64 / self.invocations.max(1) as f64
    }
}
