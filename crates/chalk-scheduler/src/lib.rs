//! Blackboard scheduling for cooperating agents.
//!
//! Agents read a shared [`Blackboard`](chalk_core::Blackboard) and each
//! contribute one value. Every tick the [`Scheduler`] picks the ready agent
//! with the best learned success rate plus stage bonus, merges its output,
//! and records the outcome in the [`MemoryStore`](chalk_core::MemoryStore) so
//! later runs prefer agents that did well.
//!
//! # Example
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use chalk_core::{ChalkConfig, MemoryStore};
//! use chalk_query::RagStore;
//! use chalk_scheduler::{agents, RunRequest, Scheduler};
//!
//! let config = ChalkConfig::discover(None).unwrap();
//! let memory = Arc::new(MemoryStore::open(&config.stores.memory));
//! let rag = Arc::new(RagStore::open(&config.stores.rag));
//! let registry =
//!     agents::standard_registry(&config, Arc::clone(&memory), rag, Path::new(".")).unwrap();
//!
//! let scheduler = Scheduler::from_config(registry, memory, &config);
//! let outcome = scheduler.run(RunRequest::new("todo api with auth").name("todo"));
//! println!("{}", outcome.to_markdown());
//! ```

pub mod agent;
pub mod agents;
pub mod error;
pub mod halt;
mod report;
mod scheduler;

pub use agent::{Agent, AgentRegistry, KeyMap, Readiness, TimeLimited};
pub use error::{AgentError, SchedulerError};
pub use halt::HaltCondition;
pub use scheduler::{RunOutcome, RunRequest, RunStatus, Scheduler, STALL_MESSAGE};
