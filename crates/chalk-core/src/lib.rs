//! Core data model for Chalk: the shared blackboard, persisted run and agent
//! records, the JSON file store they live in, and the learned-priority
//! [`MemoryStore`](memory::MemoryStore) the scheduler consults every tick.

pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod storage;

pub use config::ChalkConfig;
pub use error::CoreError;
pub use memory::{MemoryStore, MemorySummary, SimilarRun};
pub use model::{AgentId, AgentRecord, Blackboard, Decision, Outcome, RunRecord};
