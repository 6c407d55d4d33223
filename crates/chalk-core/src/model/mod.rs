pub mod agent;
pub mod blackboard;
pub mod decision;
pub mod run;

pub use agent::{AgentId, AgentRecord};
pub use blackboard::{Blackboard, ANSWERS_KEY, CONFIG_KEY, NAME_KEY, PROMPT_KEY};
pub use decision::{state_hash, Decision, Outcome};
pub use run::RunRecord;
