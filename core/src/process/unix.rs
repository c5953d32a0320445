//! Unix process backend with safe spawn/kill using process groups
//!
//! Spawned processes are placed in their own process group via `setsid()`,
//! so a kill signal reaches the entire process tree. Signals are addressed
//! by their textual name ("SIGTERM", "SIGINT", ...) because the expectation
//! policy of bounded tasks is textual; SIGTERM is the default.
//!
//! ## Safety
//!
//! - all spawned processes become their own session/process-group leaders
//! - ESRCH and EPERM when signalling are treated as "already exited"
//! - signalling never waits for OS-level process death

// Process group management requires libc::setsid() in pre_exec
#![allow(unsafe_code)]

use crate::context::TaskContext;
use crate::process::{FailedHandle, ProcessHandle, SpawnProcess, TerminalEvent};
use crate::{CoreError, Result};
use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use schema::{ProcessExit, SupervisorEvent};
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

/// A child process managed through its Unix process group
#[derive(Debug)]
pub struct UnixProcess {
    /// Process (and process group) ID of the spawned process
    pid: Pid,
    /// Underlying handle for waiting
    child: Child,
    /// Set once the exit status has been observed
    exited: bool,
}

impl UnixProcess {
    /// Get the process group ID (same as the PID for session leaders)
    pub fn pgid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    fn decode_status(&self, status: std::process::ExitStatus) -> ProcessExit {
        let signal = status
            .signal()
            .and_then(|raw| Signal::try_from(raw).ok())
            .map(|signal| signal.as_str().to_string());

        ProcessExit {
            pid: Some(self.pid.as_raw() as u32),
            code: status.code(),
            signal,
            timestamp: SupervisorEvent::current_timestamp(),
        }
    }
}

#[async_trait]
impl ProcessHandle for UnixProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid.as_raw() as u32)
    }

    async fn wait(&mut self) -> TerminalEvent {
        match self.child.wait().await {
            Ok(status) => {
                self.exited = true;
                debug!("Process {} exited with status {}", self.pid, status);
                TerminalEvent::Exited(self.decode_status(status))
            }
            Err(e) => {
                error!("Failed to wait for process {}: {}", self.pid, e);
                TerminalEvent::Failed(CoreError::ProcessWait(format!(
                    "Failed to wait for process {}: {}",
                    self.pid, e
                )))
            }
        }
    }

    fn kill(&mut self, signal: Option<&str>) -> Result<()> {
        if self.exited {
            debug!("Process {} already exited, skipping signal", self.pid);
            return Ok(());
        }
        signal_group(self.pid, parse_signal(signal)?)
    }
}

/// Spawn a new process in its own process group
///
/// The child calls `setsid()` before `exec()`, becoming the leader of a
/// fresh session and process group so the whole tree can be signalled
/// through the negative process ID. Stdio is detached; stream handling is
/// left to callers that supply their own [`SpawnProcess`] implementation.
pub fn spawn_group(cmd: &str, args: &[String]) -> Result<UnixProcess> {
    debug!("Spawning process: {} {:?}", cmd, args);

    let mut command = Command::new(cmd);
    command.args(args);
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    // Safety: setsid() is async-signal-safe and appropriate for pre_exec
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = command.spawn().map_err(|e| {
        error!("Failed to spawn process '{}': {}", cmd, e);
        CoreError::ProcessSpawn(format!("Failed to spawn '{}': {}", cmd, e))
    })?;

    let raw_pid = child
        .id()
        .ok_or_else(|| CoreError::ProcessSpawn("Spawned child did not have a PID".to_string()))?;
    let pid = Pid::from_raw(raw_pid as i32);
    debug!("Successfully spawned process {} in new process group", pid);

    Ok(UnixProcess {
        pid,
        child,
        exited: false,
    })
}

/// Parse a textual signal name, defaulting to SIGTERM
pub fn parse_signal(name: Option<&str>) -> Result<Signal> {
    match name {
        None => Ok(Signal::SIGTERM),
        Some(name) => Signal::from_str(name)
            .map_err(|_| CoreError::ProcessSignal(format!("Unknown signal name '{}'", name))),
    }
}

/// Send a signal to an entire process group
///
/// ESRCH (no such process) and EPERM (ownership changed) mean the group has
/// already exited and are treated as success.
pub fn signal_group(pid: Pid, signal: Signal) -> Result<()> {
    debug!("Sending {} to process group {}", signal, pid);

    match killpg(pid, signal) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => {
            debug!("Process group {} already exited", pid);
            Ok(())
        }
        Err(nix::errno::Errno::EPERM) => {
            debug!(
                "Permission denied signaling process group {} (likely already exited)",
                pid
            );
            Ok(())
        }
        Err(e) => {
            error!("Failed to send {} to process group {}: {}", signal, pid, e);
            Err(CoreError::ProcessSignal(format!(
                "Failed to send {} to process group {}: {}",
                signal, pid, e
            )))
        }
    }
}

/// Spawner running a fixed command through [`spawn_group`]
///
/// Spawn failures are wrapped in a [`FailedHandle`] so they surface through
/// the handle's terminal event, never as a spawner error.
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    command: String,
    args: Vec<String>,
}

impl CommandSpawner {
    /// Create a spawner for the given command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl SpawnProcess for CommandSpawner {
    fn spawn(&self, _ctx: &TaskContext) -> Box<dyn ProcessHandle> {
        match spawn_group(&self.command, &self.args) {
            Ok(process) => Box::new(process),
            Err(err) => {
                warn!("Spawn of '{}' failed: {}", self.command, err);
                Box::new(FailedHandle::new(err))
            }
        }
    }
}
