//! Process handle abstraction for the proctask core
//!
//! This module defines the contract between the supervision layer and
//! whatever actually creates processes: a [`SpawnProcess`] implementation
//! produces [`ProcessHandle`]s, and each handle reaches exactly one
//! [`TerminalEvent`]. The supervision layer never touches the OS directly;
//! platform backends live in submodules.
//!
//! ## Platform Support
//!
//! - **Unix**: full support with process groups for safe cleanup
//! - the mock backend works everywhere and is intended for tests

use crate::context::TaskContext;
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::ProcessExit;

pub mod mock;
#[cfg(unix)]
pub mod unix;

/// The single terminal event of a process handle
///
/// `Exited` and `Failed` are mutually exclusive: whichever a handle reports
/// first is its terminal event, and the handle must not be reused
/// afterwards.
#[derive(Debug)]
pub enum TerminalEvent {
    /// The process exited, normally or via signal
    Exited(ProcessExit),
    /// The process could not run (spawn failure, runtime error)
    Failed(CoreError),
}

/// A live handle to one spawned process
///
/// Handles are owned exclusively by the component that spawned them, for as
/// long as that component still references them.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Process ID, when the backend exposes one
    fn pid(&self) -> Option<u32>;

    /// Wait for the terminal event.
    ///
    /// Must be cancel-safe: callers poll this inside `tokio::select!`, so
    /// the returned future may be dropped and `wait` called again without
    /// losing the event.
    async fn wait(&mut self) -> TerminalEvent;

    /// Send a termination signal to the process.
    ///
    /// `signal` is a textual signal name ("SIGTERM", "SIGINT", ...); `None`
    /// means SIGTERM. Fire-and-forget: this never waits for OS-level
    /// process death, and it is safe to call after the process has exited.
    fn kill(&mut self, signal: Option<&str>) -> Result<()>;
}

/// The caller-supplied process creation primitive
///
/// Implementations must not fail for ordinary spawn errors: those are
/// reported through the returned handle's [`TerminalEvent::Failed`] instead
/// (see [`FailedHandle`]). A spawner may be invoked multiple times, but
/// never concurrently for the same supervisor instance.
pub trait SpawnProcess: Send + Sync {
    /// Create a new process for the given context
    fn spawn(&self, ctx: &TaskContext) -> Box<dyn ProcessHandle>;
}

impl<F> SpawnProcess for F
where
    F: Fn(&TaskContext) -> Box<dyn ProcessHandle> + Send + Sync,
{
    fn spawn(&self, ctx: &TaskContext) -> Box<dyn ProcessHandle> {
        self(ctx)
    }
}

/// Handle standing in for a process that never started
///
/// Spawners return this when process creation itself fails, so that the
/// failure travels the same terminal-event path as a runtime error.
pub struct FailedHandle {
    error: Option<CoreError>,
}

impl FailedHandle {
    /// Wrap a spawn failure as a handle
    pub fn new(error: CoreError) -> Self {
        Self { error: Some(error) }
    }
}

#[async_trait]
impl ProcessHandle for FailedHandle {
    fn pid(&self) -> Option<u32> {
        None
    }

    async fn wait(&mut self) -> TerminalEvent {
        match self.error.take() {
            Some(err) => TerminalEvent::Failed(err),
            // The terminal event has already been delivered.
            None => std::future::pending().await,
        }
    }

    fn kill(&mut self, _signal: Option<&str>) -> Result<()> {
        Ok(())
    }
}
