//! Core functionality for the proctask project
//!
//! This crate implements single-slot process supervision: a context-scoped
//! supervisor that keeps at most one process alive across spawn, kill, and
//! respawn operations, and a bounded process task that runs exactly one
//! process to completion and settles according to an expectation policy.

pub mod context;
pub mod error;
pub mod process;
pub mod supervisor;
pub mod task;

// Re-export schema types for convenience
pub use schema::*;

pub use context::TaskContext;
pub use error::{CoreError, Result};
pub use process::{ProcessHandle, SpawnProcess, TerminalEvent};
pub use supervisor::{spawn_supervisor, SpawnOutcome, SupervisorConfig, SupervisorHandle};
pub use task::ProcessTask;

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
