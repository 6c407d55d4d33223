use std::time::Duration;

use chalk_core::CoreError;

/// Why a single agent invocation produced nothing to merge.
///
/// The scheduler records these as failures and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{0}")]
    Failed(String),

    #[error("Agent {id} timed out after {after:?}")]
    Timeout { id: String, after: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Command exited with status {code:?}: {stderr}")]
    Command { code: Option<i32>, stderr: String },
}

impl AgentError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Errors raised while assembling a scheduler, never while running one.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Agent {0} is already registered")]
    DuplicateAgent(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}
