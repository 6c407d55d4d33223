//! The contract every agent implements, plus the pieces the scheduler uses to
//! hold and address them.

mod registry;
mod timeout;

pub use registry::{AgentRegistry, KeyMap};
pub use timeout::TimeLimited;

use chalk_core::Blackboard;
use serde_json::Value;

use crate::error::AgentError;

/// A unit of work that contributes one value to the blackboard.
///
/// `can_run` must not have side effects: the scheduler calls it for every
/// registered agent on every tick. `run` returns the value to merge; it never
/// writes to the blackboard itself.
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    fn can_run(&self, state: &Blackboard) -> bool;

    fn run(&self, state: &Blackboard) -> Result<Value, AgentError>;
}

/// The usual readiness predicate, expressed as data.
///
/// An agent is ready when its `skip_if` toggle is off, every required key is
/// present, and either its own key is absent or the redo flag was written
/// after its own key.
#[derive(Debug, Clone, PartialEq)]
pub struct Readiness {
    produces: String,
    requires: Vec<String>,
    redo_flag: Option<String>,
    skip_if: Option<String>,
}

impl Readiness {
    pub fn new(produces: impl Into<String>) -> Self {
        Self {
            produces: produces.into(),
            requires: Vec::new(),
            redo_flag: None,
            skip_if: None,
        }
    }

    pub fn requires<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn redo_flag(mut self, key: impl Into<String>) -> Self {
        self.redo_flag = Some(key.into());
        self
    }

    pub fn skip_if(mut self, toggle: impl Into<String>) -> Self {
        self.skip_if = Some(toggle.into());
        self
    }

    pub fn produces(&self) -> &str {
        &self.produces
    }

    pub fn is_ready(&self, state: &Blackboard) -> bool {
        if self
            .skip_if
            .as_deref()
            .is_some_and(|toggle| state.config_flag(toggle))
        {
            return false;
        }
        if !self.requires.iter().all(|key| state.contains(key)) {
            return false;
        }
        let Some(done) = state.written_at(&self.produces) else {
            return true;
        };
        self.redo_flag
            .as_deref()
            .and_then(|flag| state.written_at(flag))
            .is_some_and(|flagged| flagged > done)
    }
}
