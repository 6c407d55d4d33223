use std::collections::BTreeMap;

use chalk_core::config::KeySettings;
use chalk_core::AgentId;

use super::Agent;
use crate::error::SchedulerError;

/// Agents in registration order. Order breaks ties during selection.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Box<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: impl Agent + 'static) -> Result<&mut Self, SchedulerError> {
        self.register_boxed(Box::new(agent))
    }

    pub fn register_boxed(&mut self, agent: Box<dyn Agent>) -> Result<&mut Self, SchedulerError> {
        let id = AgentId::parse(agent.id())?;
        if self.contains(id.as_str()) {
            return Err(SchedulerError::DuplicateAgent(id.to_string()));
        }
        tracing::debug!("Registered agent {id}");
        self.agents.push(agent);
        Ok(self)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.iter().any(|a| a.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&dyn Agent> {
        self.agents.iter().find(|a| a.id() == id).map(|a| a.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Agent> {
        self.agents.iter().map(|a| a.as_ref())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Where each agent's output lands on the blackboard.
///
/// Agents not listed write under their own id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyMap(BTreeMap<String, String>);

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(&mut self, agent_id: impl Into<String>, key: impl Into<String>) -> &mut Self {
        self.0.insert(agent_id.into(), key.into());
        self
    }

    pub fn key_for<'a>(&'a self, agent_id: &'a str) -> &'a str {
        self.0.get(agent_id).map(String::as_str).unwrap_or(agent_id)
    }
}

impl From<&KeySettings> for KeyMap {
    fn from(settings: &KeySettings) -> Self {
        Self(settings.0.clone())
    }
}
