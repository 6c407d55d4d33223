//! Predicates deciding when a run has produced enough to stop early.

use chalk_core::config::HaltSettings;
use chalk_core::Blackboard;
use serde_json::Value;

/// Checked by the scheduler after every tick.
pub trait HaltCondition: Send + Sync {
    fn should_halt(&self, state: &Blackboard) -> bool;

    /// Line added to the run log when this condition stops the run.
    fn halt_message(&self, _state: &Blackboard) -> Option<String> {
        None
    }
}

/// Run until no agent is ready or the tick cap is hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl HaltCondition for Never {
    fn should_halt(&self, _state: &Blackboard) -> bool {
        false
    }
}

/// Stop once the run has been scored and finalized, and the score clears
/// `threshold` or remediation has already happened.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreGate {
    pub score_path: String,
    pub final_key: String,
    pub threshold: f64,
    pub remediation_key: Option<String>,
}

impl Default for ScoreGate {
    fn default() -> Self {
        let settings = HaltSettings::default();
        Self {
            score_path: settings.score_path,
            final_key: settings.final_key,
            threshold: settings.threshold,
            remediation_key: settings.remediation_key,
        }
    }
}

impl HaltCondition for ScoreGate {
    fn should_halt(&self, state: &Blackboard) -> bool {
        let scored_key = self.score_path.split('.').next().unwrap_or_default();
        if !state.contains(scored_key) || !state.contains(&self.final_key) {
            return false;
        }
        score_at(state, &self.score_path) >= self.threshold
            || self
                .remediation_key
                .as_deref()
                .is_some_and(|key| state.contains(key))
    }
}

/// Stop while `state[key][field]` holds something, e.g. open clarification
/// questions that need answers from outside.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPresent {
    pub key: String,
    pub field: String,
}

impl FieldPresent {
    pub fn new(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field: field.into(),
        }
    }
}

impl HaltCondition for FieldPresent {
    fn should_halt(&self, state: &Blackboard) -> bool {
        state
            .get(&self.key)
            .and_then(|v| v.get(&self.field))
            .is_some_and(is_truthy)
    }

    fn halt_message(&self, _state: &Blackboard) -> Option<String> {
        Some(format!(
            "{}.{} needs input. Halting until answers provided.",
            self.key, self.field
        ))
    }
}

/// Stop when any member condition holds.
#[derive(Default)]
pub struct AnyOf(pub Vec<Box<dyn HaltCondition>>);

impl AnyOf {
    pub fn push(&mut self, condition: impl HaltCondition + 'static) -> &mut Self {
        self.0.push(Box::new(condition));
        self
    }
}

impl HaltCondition for AnyOf {
    fn should_halt(&self, state: &Blackboard) -> bool {
        self.0.iter().any(|c| c.should_halt(state))
    }

    fn halt_message(&self, state: &Blackboard) -> Option<String> {
        self.0
            .iter()
            .find(|c| c.should_halt(state))
            .and_then(|c| c.halt_message(state))
    }
}

/// Build the configured halt condition. Field gates are checked before the
/// score gate.
pub fn from_settings(settings: &HaltSettings) -> Box<dyn HaltCondition> {
    let mut conditions: Vec<Box<dyn HaltCondition>> = settings
        .field_gates
        .iter()
        .map(|gate| Box::new(FieldPresent::new(&gate.key, &gate.field)) as Box<dyn HaltCondition>)
        .collect();
    if settings.score_gate {
        conditions.push(Box::new(ScoreGate {
            score_path: settings.score_path.clone(),
            final_key: settings.final_key.clone(),
            threshold: settings.threshold,
            remediation_key: settings.remediation_key.clone(),
        }));
    }
    match conditions.len() {
        0 => Box::new(Never),
        1 => conditions.remove(0),
        _ => Box::new(AnyOf(conditions)),
    }
}

/// Numeric value at a dotted path. Numeric strings are parsed; anything else
/// counts as 0.
pub fn score_at(state: &Blackboard, path: &str) -> f64 {
    match state.lookup(path) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
