use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chalk_core::config::CommandAgentSettings;
use chalk_core::{AgentId, Blackboard, CoreError};
use serde_json::Value;

use crate::agent::{Agent, Readiness};
use crate::error::{AgentError, SchedulerError};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What an external process left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    /// The process was killed at its deadline; output is discarded.
    pub timed_out: bool,
}

/// Runs an external program. Mockable for testing.
pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion, killing it once `timeout` has elapsed.
    fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: &[u8],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> std::io::Result<CommandOutput>;
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: &[u8],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> std::io::Result<CommandOutput> {
        tracing::debug!("Running {program} {args:?}");
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        let mut child = cmd.spawn()?;

        // Pipes are fed and drained on their own threads so the child never
        // blocks on a full buffer while we wait on it.
        let writer = child.stdin.take().map(|mut pipe| {
            let input = stdin.to_vec();
            std::thread::spawn(move || {
                let _ = pipe.write_all(&input);
            })
        });
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match timeout {
            None => child.wait()?,
            Some(limit) => {
                let deadline = Instant::now() + limit;
                loop {
                    if let Some(status) = child.try_wait()? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        tracing::warn!("Killing {program} after {limit:?}");
                        let _ = child.kill();
                        let status = child.wait()?;
                        // Grandchildren may still hold the pipes open, so the
                        // reader threads are left to finish on their own.
                        return Ok(CommandOutput {
                            stdout: String::new(),
                            stderr: String::new(),
                            exit_code: status.code(),
                            success: false,
                            timed_out: true,
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        };
        if let Some(handle) = writer {
            let _ = handle.join();
        }

        Ok(CommandOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
            exit_code: status.code(),
            success: status.success(),
            timed_out: false,
        })
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

/// An agent implemented by an external program.
///
/// The program receives the blackboard as JSON on stdin and must print one
/// JSON value on stdout. A non-zero exit or unparsable output is a failure.
pub struct CommandAgent {
    id: String,
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    readiness: Readiness,
    timeout: Option<Duration>,
    runner: Box<dyn CommandRunner>,
}

impl CommandAgent {
    /// `produces` is the blackboard key the agent's output is merged under.
    pub fn new(
        id: impl Into<String>,
        command: Vec<String>,
        produces: impl Into<String>,
    ) -> Result<Self, SchedulerError> {
        let id = AgentId::parse(id)?;
        let mut command = command.into_iter();
        let program = command
            .next()
            .ok_or_else(|| CoreError::Config(format!("agent {id} has an empty command")))?;
        Ok(Self {
            readiness: Readiness::new(produces),
            id: id.to_string(),
            program,
            args: command.collect(),
            working_dir: None,
            timeout: None,
            runner: Box::new(SystemCommandRunner),
        })
    }

    pub fn from_settings(
        settings: &CommandAgentSettings,
        produces: &str,
    ) -> Result<Self, SchedulerError> {
        let mut readiness = Readiness::new(produces).requires(settings.requires.iter().cloned());
        if let Some(flag) = &settings.redo_flag {
            readiness = readiness.redo_flag(flag.as_str());
        }
        if let Some(toggle) = &settings.skip_if {
            readiness = readiness.skip_if(toggle.as_str());
        }
        let mut agent = Self::new(settings.id.as_str(), settings.command.clone(), produces)?
            .readiness(readiness);
        agent.working_dir = settings.working_dir.clone();
        agent.timeout = settings.timeout_secs.map(Duration::from_secs);
        Ok(agent)
    }

    pub fn readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Kill the process if a run takes longer than `limit`.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Box the agent, bounding each run by `timeout` when one is given.
    pub fn into_agent(self, timeout: Option<Duration>) -> Box<dyn Agent> {
        match timeout {
            Some(limit) => Box::new(self.timeout(limit)),
            None => Box::new(self),
        }
    }
}

impl Agent for CommandAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn can_run(&self, state: &Blackboard) -> bool {
        self.readiness.is_ready(state)
    }

    fn run(&self, state: &Blackboard) -> Result<Value, AgentError> {
        let input = serde_json::to_vec(state)?;
        let output = self.runner.run(
            &self.program,
            &self.args,
            &input,
            self.working_dir.as_deref(),
            self.timeout,
        )?;
        if output.timed_out {
            return Err(AgentError::Timeout {
                id: self.id.clone(),
                after: self.timeout.unwrap_or_default(),
            });
        }
        if !output.success {
            return Err(AgentError::Command {
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Err(AgentError::failed(format!("{} printed nothing", self.program)));
        }
        Ok(serde_json::from_str(stdout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct MockRunner {
        output: CommandOutput,
        seen_stdin: Mutex<Vec<u8>>,
    }

    impl MockRunner {
        fn new(stdout: &str, exit_code: i32, stderr: &str) -> Self {
            Self {
                output: CommandOutput {
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                    exit_code: Some(exit_code),
                    success: exit_code == 0,
                    timed_out: false,
                },
                seen_stdin: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for Arc<MockRunner> {
        fn run(
            &self,
            _program: &str,
            _args: &[String],
            stdin: &[u8],
            _working_dir: Option<&Path>,
            _timeout: Option<Duration>,
        ) -> std::io::Result<CommandOutput> {
            *self.seen_stdin.lock().unwrap() = stdin.to_vec();
            Ok(self.output.clone())
        }
    }

    fn agent(runner: Arc<MockRunner>) -> CommandAgent {
        CommandAgent::new("tech_select", vec!["picker".into()], "tech")
            .unwrap()
            .with_runner(runner)
    }

    #[test]
    fn test_sends_state_and_parses_stdout() {
        let runner = Arc::new(MockRunner::new("{\"stack\": [\"rust\"]}\n", 0, ""));
        let agent = agent(Arc::clone(&runner));
        let state = Blackboard::seeded("cli tool", "n");
        assert_eq!(agent.run(&state).unwrap(), json!({"stack": ["rust"]}));

        let sent: Value = serde_json::from_slice(&runner.seen_stdin.lock().unwrap()).unwrap();
        assert_eq!(sent, json!({"prompt": "cli tool", "name": "n"}));
    }

    #[test]
    fn test_non_zero_exit() {
        let agent = agent(Arc::new(MockRunner::new("", 2, "no model\n")));
        let err = agent.run(&Blackboard::new()).unwrap_err();
        assert!(matches!(err, AgentError::Command { code: Some(2), ref stderr } if stderr == "no model"));
    }

    #[test]
    fn test_bad_output() {
        let garbage = agent(Arc::new(MockRunner::new("not json", 0, "")));
        assert!(matches!(
            garbage.run(&Blackboard::new()),
            Err(AgentError::Serde(_))
        ));
        let silent = agent(Arc::new(MockRunner::new("  \n", 0, "")));
        assert!(matches!(
            silent.run(&Blackboard::new()),
            Err(AgentError::Failed(_))
        ));
    }

    #[test]
    fn test_from_settings() {
        let settings = CommandAgentSettings {
            id: "tests".into(),
            command: vec!["pytest".into(), "-q".into()],
            requires: vec!["codegen".into()],
            redo_flag: None,
            skip_if: Some("boilerplate_only".into()),
            timeout_secs: Some(30),
            working_dir: None,
        };
        let agent = CommandAgent::from_settings(&settings, "tests").unwrap();
        assert_eq!(agent.id(), "tests");
        assert_eq!(agent.args, vec!["-q"]);
        assert_eq!(agent.timeout, Some(Duration::from_secs(30)));

        let mut state = Blackboard::seeded("p", "n");
        assert!(!agent.can_run(&state));
        state.insert("codegen", json!({})).unwrap();
        assert!(agent.can_run(&state));
        state
            .insert("config", json!({"boilerplate_only": true}))
            .unwrap();
        assert!(!agent.can_run(&state));
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandAgent::new("x", Vec::new(), "x"),
            Err(SchedulerError::Core(CoreError::Config(_)))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_round_trip() {
        let agent = CommandAgent::new("echo", vec!["sh".into(), "-c".into(), "cat".into()], "echo")
            .unwrap()
            .into_agent(Some(Duration::from_secs(10)));
        let state = Blackboard::seeded("echo me", "n");
        assert_eq!(agent.run(&state).unwrap(), state.to_json());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_failure() {
        let agent = CommandAgent::new(
            "fails",
            vec!["sh".into(), "-c".into(), "echo broken >&2; exit 3".into()],
            "fails",
        )
        .unwrap();
        let err = agent.run(&Blackboard::new()).unwrap_err();
        assert!(matches!(err, AgentError::Command { code: Some(3), ref stderr } if stderr == "broken"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let tmp = tempfile::TempDir::new().unwrap();
        let marker = tmp.path().join("finished");
        let script = format!(
            "cat >/dev/null; sleep 1; touch '{}'; echo '{{}}'",
            marker.display()
        );
        let agent = CommandAgent::new("slowcmd", vec!["sh".into(), "-c".into(), script], "slowcmd")
            .unwrap()
            .into_agent(Some(Duration::from_millis(200)));

        let started = Instant::now();
        let err = agent.run(&Blackboard::seeded("p", "n")).unwrap_err();
        assert!(matches!(err, AgentError::Timeout { ref id, .. } if id == "slowcmd"));
        assert!(started.elapsed() < Duration::from_secs(1));

        std::thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_fast_command_within_timeout() {
        let agent = CommandAgent::new(
            "quick",
            vec!["sh".into(), "-c".into(), "cat >/dev/null; echo '{\"ok\": true}'".into()],
            "quick",
        )
        .unwrap()
        .timeout(Duration::from_secs(10));
        assert_eq!(agent.run(&Blackboard::new()).unwrap(), json!({"ok": true}));
    }
}
