//! Supervisor actor owning the single ownership slot
//!
//! [`ProcessSupervisor`] implements the supervision state machine for one
//! task context. The actor is the only reader and writer of the slot, so
//! attribution of a new handle and observation of its terminal event can
//! never race: the handle's `wait` future is only polled while the handle
//! occupies the slot, and a handle removed from the slot (kill, respawn)
//! has its pending `wait` dropped, which is what makes its late events
//! structurally unobservable rather than merely ignored.

use super::{ControlMsg, SpawnOutcome};
use crate::context::TaskContext;
use crate::process::{ProcessHandle, SpawnProcess, TerminalEvent};
use crate::Result;
use schema::{ProcessToken, SupervisorEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

/// One attributed process: its generation token and the owned handle
struct AttributedProcess {
    token: ProcessToken,
    handle: Box<dyn ProcessHandle>,
}

/// Actor managing the ownership slot for a single task context
pub struct ProcessSupervisor {
    /// Process creation primitive
    spawner: Arc<dyn SpawnProcess>,
    /// Context supplying disposal notification and the failure sink
    ctx: TaskContext,
    /// Optional event broadcaster
    event_tx: Option<broadcast::Sender<SupervisorEvent>>,
    /// The ownership slot: at most one live attributed process
    current: Option<AttributedProcess>,
    /// Publisher for the current attribution token
    current_tx: watch::Sender<Option<ProcessToken>>,
    /// Generation counter; each spawn gets the next token
    generation: u64,
}

impl ProcessSupervisor {
    /// Create a new supervisor actor
    pub fn new(
        spawner: Arc<dyn SpawnProcess>,
        ctx: TaskContext,
        event_tx: Option<broadcast::Sender<SupervisorEvent>>,
        current_tx: watch::Sender<Option<ProcessToken>>,
    ) -> Self {
        Self {
            spawner,
            ctx,
            event_tx,
            current: None,
            current_tx,
            generation: 0,
        }
    }

    /// Run the supervisor task loop until the context disposes or every
    /// control handle is dropped
    pub async fn run(&mut self, mut control_rx: mpsc::UnboundedReceiver<ControlMsg>) -> Result<()> {
        let mut dispose_rx = self.ctx.disposed();

        // The context may have disposed before this task got to run.
        if self.ctx.is_disposed() {
            debug!("Context already disposed, supervisor not accepting operations");
            return Ok(());
        }

        loop {
            tokio::select! {
                msg = control_rx.recv() => {
                    match msg {
                        Some(msg) => {
                            debug!("Received control message: {:?}", msg);
                            self.handle_control_message(msg);
                        }
                        None => {
                            debug!("Control channel closed, shutting down supervisor");
                            break;
                        }
                    }
                }

                // Observe the attributed process's terminal event
                event = self.wait_for_terminal_event(), if self.current.is_some() => {
                    self.handle_terminal_event(event);
                }

                changed = dispose_rx.changed() => {
                    if changed.is_err() || *dispose_rx.borrow() {
                        info!("Context disposing, shutting down supervisor");
                        break;
                    }
                }
            }
        }

        // Disposal kills unconditionally; a no-op when nothing is attributed.
        self.kill(None);
        Ok(())
    }

    /// Handle a control message
    fn handle_control_message(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::Spawn { response } => {
                let _ = response.send(self.spawn());
            }
            ControlMsg::Kill { signal, response } => {
                self.kill(signal.as_deref());
                let _ = response.send(());
            }
            ControlMsg::Respawn { response } => {
                self.kill(None);
                let _ = response.send(self.spawn());
            }
        }
    }

    /// Spawn a process if the slot is empty
    ///
    /// Attribution is a single actor step: the handle enters the slot
    /// before its terminal event can be observed.
    fn spawn(&mut self) -> SpawnOutcome {
        if let Some(attributed) = &self.current {
            debug!("Process {} already attributed, spawn is a no-op", attributed.token);
            return SpawnOutcome::AlreadyRunning;
        }

        let handle = self.spawner.spawn(&self.ctx);
        let pid = handle.pid();

        self.generation += 1;
        let token = ProcessToken(self.generation);
        self.current = Some(AttributedProcess { token, handle });
        self.current_tx.send_replace(Some(token));
        self.emit(SupervisorEvent::process_spawned(token, pid));

        info!("Attributed process {} (pid {:?})", token, pid);
        SpawnOutcome::Spawned(token)
    }

    /// Kill the attributed process and clear the slot eagerly
    ///
    /// The slot is emptied before the OS-level exit happens, so a
    /// subsequent spawn is never blocked on process death.
    fn kill(&mut self, signal: Option<&str>) {
        if let Some(mut attributed) = self.current.take() {
            debug!("Killing attributed process {}", attributed.token);
            if let Err(e) = attributed.handle.kill(signal) {
                warn!("Failed to signal process {}: {}", attributed.token, e);
            }
            self.current_tx.send_replace(None);
        }
    }

    /// Apply the attributed process's terminal event
    fn handle_terminal_event(&mut self, event: TerminalEvent) {
        // The wait arm is only polled while the slot is occupied.
        let Some(mut attributed) = self.current.take() else {
            return;
        };
        self.current_tx.send_replace(None);

        match event {
            TerminalEvent::Exited(exit) => {
                // An exit of a supervised process is not an error at this
                // layer; exit-code policy belongs to the bounded task.
                debug!(
                    "Process {} exited (code: {:?}, signal: {:?})",
                    attributed.token, exit.code, exit.signal
                );
                self.emit(SupervisorEvent::ProcessExited {
                    token: attributed.token,
                    exit,
                });
            }
            TerminalEvent::Failed(err) => {
                warn!("Process {} failed: {}", attributed.token, err);
                if let Err(e) = attributed.handle.kill(None) {
                    warn!("Failed to signal failed process {}: {}", attributed.token, e);
                }
                self.emit(SupervisorEvent::process_failed(
                    attributed.token,
                    err.to_string(),
                ));
                // Escalate exactly once into the enclosing unit of work.
                self.ctx.fail(err);
            }
        }
    }

    async fn wait_for_terminal_event(&mut self) -> TerminalEvent {
        match self.current.as_mut() {
            Some(attributed) => attributed.handle.wait().await,
            // Unreachable: the select arm is guarded on current.is_some()
            None => std::future::pending().await,
        }
    }

    fn emit(&self, event: SupervisorEvent) {
        if let Some(event_tx) = &self.event_tx {
            // Best-effort: no subscribers is fine
            let _ = event_tx.send(event);
        }
    }
}
