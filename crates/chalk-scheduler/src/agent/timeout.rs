use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use chalk_core::Blackboard;
use serde_json::Value;

use super::Agent;
use crate::error::AgentError;

/// Bounds an agent's `run` by a deadline.
///
/// The wrapped agent runs on a worker thread against a snapshot of the
/// blackboard. On timeout the worker is left to finish on its own and its
/// result is dropped.
pub struct TimeLimited<A> {
    inner: Arc<A>,
    limit: Duration,
}

impl<A: Agent + 'static> TimeLimited<A> {
    pub fn new(inner: A, limit: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            limit,
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl<A: Agent + 'static> Agent for TimeLimited<A> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn can_run(&self, state: &Blackboard) -> bool {
        self.inner.can_run(state)
    }

    fn run(&self, state: &Blackboard) -> Result<Value, AgentError> {
        let (tx, rx) = mpsc::channel();
        let agent = Arc::clone(&self.inner);
        let snapshot = state.clone();
        std::thread::Builder::new()
            .name(format!("agent-{}", self.id()))
            .spawn(move || {
                // The receiver is gone once the deadline has passed.
                let _ = tx.send(agent.run(&snapshot));
            })?;

        match rx.recv_timeout(self.limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("Agent {} exceeded {:?}", self.id(), self.limit);
                Err(AgentError::Timeout {
                    id: self.id().to_string(),
                    after: self.limit,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(AgentError::failed(format!(
                "agent {} stopped without a result",
                self.id()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Sleepy {
        nap: Duration,
    }

    impl Agent for Sleepy {
        fn id(&self) -> &str {
            "sleepy"
        }
        fn can_run(&self, _state: &Blackboard) -> bool {
            true
        }
        fn run(&self, state: &Blackboard) -> Result<Value, AgentError> {
            std::thread::sleep(self.nap);
            Ok(json!({"prompt": state.prompt()}))
        }
    }

    struct Panics;

    impl Agent for Panics {
        fn id(&self) -> &str {
            "panics"
        }
        fn can_run(&self, _state: &Blackboard) -> bool {
            true
        }
        fn run(&self, _state: &Blackboard) -> Result<Value, AgentError> {
            panic!("boom")
        }
    }

    #[test]
    fn test_result_within_limit() {
        let agent = TimeLimited::new(
            Sleepy {
                nap: Duration::from_millis(1),
            },
            Duration::from_secs(5),
        );
        let state = Blackboard::seeded("hello", "n");
        assert_eq!(agent.id(), "sleepy");
        assert_eq!(agent.run(&state).unwrap(), json!({"prompt": "hello"}));
    }

    #[test]
    fn test_timeout() {
        let agent = TimeLimited::new(
            Sleepy {
                nap: Duration::from_millis(500),
            },
            Duration::from_millis(20),
        );
        let err = agent.run(&Blackboard::new()).unwrap_err();
        assert!(matches!(err, AgentError::Timeout { ref id, .. } if id == "sleepy"));
    }

    #[test]
    fn test_worker_panic_is_a_failure() {
        let agent = TimeLimited::new(Panics, Duration::from_secs(5));
        let err = agent.run(&Blackboard::new()).unwrap_err();
        assert!(matches!(err, AgentError::Failed(_)));
    }
}
