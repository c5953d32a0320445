//! Scripted fake processes for testing
//!
//! [`FakeSpawner`] hands out [`FakeProcess`] handles that follow a
//! per-spawn [`FakeScript`]: exit with a code or signal after a delay,
//! report an error, and either acknowledge or ignore kill signals. Each
//! spawn leaves behind a [`FakeProbe`] so tests can observe whether and how
//! the process was signalled.

use crate::context::TaskContext;
use crate::process::{ProcessHandle, SpawnProcess, TerminalEvent};
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::{ProcessExit, SupervisorEvent};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Behavior of one fake process
#[derive(Debug, Clone)]
pub struct FakeScript {
    /// How long the process "runs" before exiting on its own
    pub exit_delay: Duration,
    /// Exit code reported on natural exit
    pub exit_code: Option<i32>,
    /// Terminating signal reported on natural exit
    pub signal: Option<String>,
    /// If set, the process reports this error instead of exiting
    pub error: Option<String>,
    /// Whether a kill signal makes the process exit immediately
    pub responds_to_kill: bool,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            exit_delay: Duration::from_millis(50),
            exit_code: Some(0),
            signal: None,
            error: None,
            responds_to_kill: true,
        }
    }
}

impl FakeScript {
    /// A process that exits with the given code after the default delay
    pub fn exit_with(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    /// A process terminated by the given signal after the default delay
    pub fn signaled(signal: &str) -> Self {
        Self {
            exit_code: None,
            signal: Some(signal.to_string()),
            ..Self::default()
        }
    }

    /// A process that reports an error after the default delay
    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// A process that never exits on its own
    pub fn long_running() -> Self {
        Self {
            exit_delay: Duration::from_secs(3600),
            ..Self::default()
        }
    }

    /// Set the natural exit delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.exit_delay = delay;
        self
    }

    /// Make the process ignore kill signals (it only exits naturally)
    pub fn ignoring_kill(mut self) -> Self {
        self.responds_to_kill = false;
        self
    }
}

/// Observation point for one spawned fake process
#[derive(Debug, Clone)]
pub struct FakeProbe {
    /// Fake process ID
    pub pid: u32,
    killed: Arc<Mutex<Option<String>>>,
}

impl FakeProbe {
    /// The first signal the process was sent, if any
    pub fn killed_with(&self) -> Option<String> {
        self.killed.lock().unwrap().clone()
    }

    /// Whether the process was sent any kill signal
    pub fn was_killed(&self) -> bool {
        self.killed.lock().unwrap().is_some()
    }
}

/// Spawner producing scripted fake processes
#[derive(Debug, Clone, Default)]
pub struct FakeSpawner {
    scripts: Arc<Mutex<Vec<FakeScript>>>,
    probes: Arc<Mutex<Vec<FakeProbe>>>,
    next_pid: Arc<AtomicU32>,
}

impl FakeSpawner {
    /// Create a spawner with no scripted behavior; spawns follow
    /// [`FakeScript::default`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a spawner whose first spawns follow the given scripts, in order
    pub fn scripted(scripts: Vec<FakeScript>) -> Self {
        let spawner = Self::new();
        *spawner.scripts.lock().unwrap() = scripts;
        spawner
    }

    /// Queue a script for the next spawn
    pub fn push_script(&self, script: FakeScript) {
        self.scripts.lock().unwrap().push(script);
    }

    /// Number of processes spawned so far
    pub fn spawn_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    /// Probe for the nth spawned process
    pub fn probe(&self, index: usize) -> Option<FakeProbe> {
        self.probes.lock().unwrap().get(index).cloned()
    }
}

impl SpawnProcess for FakeSpawner {
    fn spawn(&self, _ctx: &TaskContext) -> Box<dyn ProcessHandle> {
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                FakeScript::default()
            } else {
                scripts.remove(0)
            }
        };

        let pid = 1000 + self.next_pid.fetch_add(1, Ordering::Relaxed);
        let killed = Arc::new(Mutex::new(None));
        debug!("Spawning fake process {} with script {:?}", pid, script);

        self.probes.lock().unwrap().push(FakeProbe {
            pid,
            killed: killed.clone(),
        });

        Box::new(FakeProcess {
            pid,
            deadline: Instant::now() + script.exit_delay,
            script,
            killed,
            acknowledged_kill: None,
        })
    }
}

/// Fake process handle driven by a [`FakeScript`]
pub struct FakeProcess {
    pid: u32,
    deadline: Instant,
    script: FakeScript,
    killed: Arc<Mutex<Option<String>>>,
    /// Signal the process decided to die from, when it responds to kills
    acknowledged_kill: Option<String>,
}

impl FakeProcess {
    fn exit(&self, code: Option<i32>, signal: Option<String>) -> TerminalEvent {
        TerminalEvent::Exited(ProcessExit {
            pid: Some(self.pid),
            code,
            signal,
            timestamp: SupervisorEvent::current_timestamp(),
        })
    }
}

#[async_trait]
impl ProcessHandle for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> TerminalEvent {
        // A kill that the process acknowledges preempts the natural exit;
        // waiting on the absolute deadline keeps this cancel-safe.
        if self.acknowledged_kill.is_none() {
            tokio::time::sleep_until(self.deadline).await;
        }

        if let Some(signal) = self.acknowledged_kill.clone() {
            return self.exit(None, Some(signal));
        }
        if let Some(message) = self.script.error.clone() {
            return TerminalEvent::Failed(CoreError::Other(message));
        }
        self.exit(self.script.exit_code, self.script.signal.clone())
    }

    fn kill(&mut self, signal: Option<&str>) -> Result<()> {
        let name = signal.unwrap_or("SIGTERM").to_string();
        debug!("Fake process {} received {}", self.pid, name);

        let mut killed = self.killed.lock().unwrap();
        if killed.is_none() {
            *killed = Some(name.clone());
        }
        if self.script.responds_to_kill && self.acknowledged_kill.is_none() {
            self.acknowledged_kill = Some(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_natural_exit() {
        let spawner = FakeSpawner::scripted(vec![FakeScript::exit_with(7)]);
        let (ctx, _failure_rx) = TaskContext::new();

        let mut handle = spawner.spawn(&ctx);
        match handle.wait().await {
            TerminalEvent::Exited(exit) => {
                assert_eq!(exit.code, Some(7));
                assert_eq!(exit.signal, None);
                assert_eq!(exit.pid, handle.pid());
            }
            other => panic!("Expected exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_kill_preempts_natural_exit() {
        let spawner = FakeSpawner::scripted(vec![FakeScript::long_running()]);
        let (ctx, _failure_rx) = TaskContext::new();

        let mut handle = spawner.spawn(&ctx);
        handle.kill(Some("SIGINT")).unwrap();

        match handle.wait().await {
            TerminalEvent::Exited(exit) => {
                assert_eq!(exit.code, None);
                assert_eq!(exit.signal.as_deref(), Some("SIGINT"));
            }
            other => panic!("Expected exit, got {:?}", other),
        }
        assert_eq!(spawner.probe(0).unwrap().killed_with().as_deref(), Some("SIGINT"));
    }

    #[tokio::test]
    async fn test_ignoring_kill_records_but_keeps_running() {
        let spawner =
            FakeSpawner::scripted(vec![FakeScript::exit_with(0).ignoring_kill()]);
        let (ctx, _failure_rx) = TaskContext::new();

        let mut handle = spawner.spawn(&ctx);
        handle.kill(None).unwrap();

        // The kill is recorded but the process still exits naturally.
        assert!(spawner.probe(0).unwrap().was_killed());
        match handle.wait().await {
            TerminalEvent::Exited(exit) => assert_eq!(exit.code, Some(0)),
            other => panic!("Expected exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failing_script() {
        let spawner = FakeSpawner::scripted(vec![FakeScript::failing("broken")]);
        let (ctx, _failure_rx) = TaskContext::new();

        let mut handle = spawner.spawn(&ctx);
        match handle.wait().await {
            TerminalEvent::Failed(CoreError::Other(message)) => assert_eq!(message, "broken"),
            other => panic!("Expected failure, got {:?}", other),
        }
    }
}
