//! Bounded process task: run exactly one process to completion
//!
//! A [`ProcessTask`] spawns one process when it runs, awaits its terminal
//! event, and settles according to the configured expectation policy: an
//! exact exit code or an exact terminating signal denotes success, anything
//! else fails with the observed values attached.
//!
//! Early disposal of the context does not end the task: with
//! `kill_on_dispose` the process is signalled immediately, without it the
//! process keeps running, and in both cases the task still settles on the
//! eventual terminal event.

use crate::context::TaskContext;
use crate::process::{SpawnProcess, TerminalEvent};
use crate::{CoreError, Result};
use schema::{Expect, ProcessExit, TaskOptions};
use std::sync::Arc;
use tracing::debug;

/// One-shot unit of work running a single process to completion
///
/// Per invocation the task moves `idle → spawned → terminal`; terminal
/// states are final and there are no retries.
pub struct ProcessTask {
    spawner: Arc<dyn SpawnProcess>,
    options: TaskOptions,
}

impl ProcessTask {
    /// Create a task with validated options
    ///
    /// Misconfiguration (an invalid signal name in `expect`) is rejected
    /// here, before any process is created.
    pub fn new(spawner: Arc<dyn SpawnProcess>, options: TaskOptions) -> Result<Self> {
        validate_options(&options)?;
        Ok(Self { spawner, options })
    }

    /// Create a task with default options (expect exit code 0, leave the
    /// process running on disposal)
    pub fn with_defaults(spawner: Arc<dyn SpawnProcess>) -> Self {
        Self {
            spawner,
            options: TaskOptions::default(),
        }
    }

    /// The options this task runs with
    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    /// Spawn the process and await its terminal event
    ///
    /// Resolves with the exit record when it satisfies the expectation
    /// policy, with [`CoreError::UnexpectedExit`] on a policy mismatch, and
    /// with the underlying error when the process fails outright.
    pub async fn run(&self, ctx: &TaskContext) -> Result<ProcessExit> {
        let mut handle = self.spawner.spawn(ctx);
        // The disposal hook is registered before the first await.
        let mut dispose_rx = ctx.disposed();
        let mut disposal_handled = false;

        // The context may already be disposing when the task starts.
        if ctx.is_disposed() {
            self.on_dispose(handle.as_mut())?;
            disposal_handled = true;
        }

        loop {
            tokio::select! {
                event = handle.wait() => {
                    return match event {
                        TerminalEvent::Failed(err) => Err(err),
                        TerminalEvent::Exited(exit) => self.settle(exit),
                    };
                }

                changed = dispose_rx.changed(), if !disposal_handled => {
                    disposal_handled = true;
                    if changed.is_ok() && *dispose_rx.borrow() {
                        self.on_dispose(handle.as_mut())?;
                    }
                }
            }
        }
    }

    fn on_dispose(&self, handle: &mut dyn crate::process::ProcessHandle) -> Result<()> {
        if self.options.kill_on_dispose {
            debug!("Context disposed, killing bounded process");
            handle.kill(None)?;
        } else {
            debug!("Context disposed, waiting for natural process exit");
        }
        Ok(())
    }

    fn settle(&self, exit: ProcessExit) -> Result<ProcessExit> {
        if self.options.expect.matches(&exit) {
            debug!(
                "Process satisfied expectation (code: {:?}, signal: {:?})",
                exit.code, exit.signal
            );
            Ok(exit)
        } else {
            Err(CoreError::UnexpectedExit {
                code: exit.code,
                signal: exit.signal,
            })
        }
    }
}

/// Validate task options before any process is created
fn validate_options(options: &TaskOptions) -> Result<()> {
    if let Expect::Signal(name) = &options.expect {
        if name.is_empty() || !name.starts_with("SIG") {
            return Err(CoreError::ValidationError(format!(
                "Invalid signal name '{}' in expect",
                name
            )));
        }
    }
    Ok(())
}
