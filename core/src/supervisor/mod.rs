//! Single-slot process supervisor
//!
//! This module guarantees that at most one live process is attributed to a
//! task context at any time, and keeps that attribution consistent despite
//! concurrent completion/error notifications and caller-issued kill/respawn.
//!
//! ## Architecture
//!
//! The supervisor is an actor: a dedicated tokio task owns the single
//! ownership slot and is the only writer of it. Operations arrive as
//! control messages and are acknowledged via oneshot channels, so a caller
//! that has awaited an operation has observed the completed state
//! transition. Each attributed process carries a generation token; the
//! token of the current attribution is published on a watch channel.
//!
//! ## Components
//!
//! - [`SupervisorHandle`]: control interface for supervisor operations
//! - [`ControlMsg`]: messages for spawn/kill/respawn
//! - [`ProcessSupervisor`]: actor task owning the slot

use crate::context::TaskContext;
use crate::process::SpawnProcess;
use crate::{CoreError, Result};
use schema::{ProcessToken, SupervisorEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info};

pub mod process_supervisor;


pub use process_supervisor::ProcessSupervisor;

/// Control messages for supervisor operations
#[derive(Debug)]
pub enum ControlMsg {
    /// Spawn a process if none is attributed
    Spawn {
        /// Response channel for the spawn outcome
        response: oneshot::Sender<SpawnOutcome>,
    },
    /// Kill the attributed process (no-op when nothing is attributed)
    Kill {
        /// Textual signal name; None means SIGTERM
        signal: Option<String>,
        /// Acknowledged once the slot has been cleared
        response: oneshot::Sender<()>,
    },
    /// Kill the attributed process (if any) and spawn a fresh one
    Respawn {
        /// Response channel for the spawn outcome
        response: oneshot::Sender<SpawnOutcome>,
    },
}

/// Result of a spawn or respawn operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// A new process was spawned and attributed
    Spawned(ProcessToken),
    /// A live process is already attributed; nothing was done
    AlreadyRunning,
}

impl SpawnOutcome {
    /// Whether this outcome attributed a new process
    pub fn newly_spawned(&self) -> bool {
        matches!(self, SpawnOutcome::Spawned(_))
    }

    /// Token of the newly attributed process, if one was spawned
    pub fn token(&self) -> Option<ProcessToken> {
        match self {
            SpawnOutcome::Spawned(token) => Some(*token),
            SpawnOutcome::AlreadyRunning => None,
        }
    }
}

/// Handle for controlling a supervisor instance
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    /// Channel for sending control messages
    control_tx: mpsc::UnboundedSender<ControlMsg>,
    /// Receiver for the current attribution token
    current_rx: watch::Receiver<Option<ProcessToken>>,
}

impl SupervisorHandle {
    /// Send a control message to the supervisor
    fn send(&self, msg: ControlMsg) -> Result<()> {
        self.control_tx
            .send(msg)
            .map_err(|_| CoreError::SupervisorClosed)?;
        Ok(())
    }

    /// Spawn a process if none is attributed
    ///
    /// Returns [`SpawnOutcome::AlreadyRunning`] without side effects when a
    /// live process is already attributed.
    pub async fn spawn(&self) -> Result<SpawnOutcome> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ControlMsg::Spawn {
            response: response_tx,
        })?;
        response_rx.await.map_err(|_| CoreError::SupervisorClosed)
    }

    /// Kill the attributed process with the default signal (SIGTERM)
    ///
    /// Safe to call when nothing is attributed. When this resolves, the
    /// ownership slot is already empty; the OS-level process may still be
    /// terminating.
    pub async fn kill(&self) -> Result<()> {
        self.kill_with(None).await
    }

    /// Kill the attributed process with a specific signal
    pub async fn kill_with(&self, signal: Option<String>) -> Result<()> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ControlMsg::Kill {
            signal,
            response: response_tx,
        })?;
        response_rx.await.map_err(|_| CoreError::SupervisorClosed)
    }

    /// Kill the attributed process (if any) and spawn a fresh one
    ///
    /// Never rejected as already-running: the kill clears the slot eagerly,
    /// so the spawn always attributes a new process.
    pub async fn respawn(&self) -> Result<SpawnOutcome> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(ControlMsg::Respawn {
            response: response_tx,
        })?;
        response_rx.await.map_err(|_| CoreError::SupervisorClosed)
    }

    /// Get the token of the currently attributed process, if any
    pub fn current_process(&self) -> Option<ProcessToken> {
        *self.current_rx.borrow()
    }

    /// Subscribe to attribution changes
    pub fn subscribe_current(&self) -> watch::Receiver<Option<ProcessToken>> {
        self.current_rx.clone()
    }
}

/// Configuration for spawning a supervisor
pub struct SupervisorConfig {
    /// Process creation primitive
    pub spawner: Arc<dyn SpawnProcess>,
    /// Context supplying the disposal hook and failure sink
    pub ctx: TaskContext,
    /// Optional event broadcaster for spawn/exit/failure notifications
    pub event_tx: Option<broadcast::Sender<SupervisorEvent>>,
}

/// Spawn a supervisor for the given context
///
/// This creates a new tokio task that owns the ownership slot for the life
/// of the context. The task kills the attributed process and terminates
/// when the context disposes; all operations on the returned handle fail
/// with [`CoreError::SupervisorClosed`] after that.
pub fn spawn_supervisor(config: SupervisorConfig) -> SupervisorHandle {
    let SupervisorConfig {
        spawner,
        ctx,
        event_tx,
    } = config;

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (current_tx, current_rx) = watch::channel(None);

    info!("Spawning process supervisor");

    tokio::spawn(async move {
        let mut supervisor = ProcessSupervisor::new(spawner, ctx, event_tx, current_tx);

        if let Err(e) = supervisor.run(control_rx).await {
            error!("Supervisor task failed: {}", e);
        }
    });

    SupervisorHandle {
        control_tx,
        current_rx,
    }
}
