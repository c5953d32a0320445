//! Core error types and utilities

use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    #[error("Failed to signal process: {0}")]
    ProcessSignal(String),

    #[error("Failed to wait for process: {0}")]
    ProcessWait(String),

    #[error("Unexpected exit (code: {code:?}, signal: {signal:?})")]
    UnexpectedExit {
        code: Option<i32>,
        signal: Option<String>,
    },

    #[error("Supervisor has shut down")]
    SupervisorClosed,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Other(String),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ValidationError(_) => "PROC001",
            CoreError::InitializationError(_) => "PROC002",
            CoreError::ProcessSpawn(_) => "PROC003",
            CoreError::ProcessSignal(_) => "PROC004",
            CoreError::ProcessWait(_) => "PROC005",
            CoreError::UnexpectedExit { .. } => "PROC006",
            CoreError::SupervisorClosed => "PROC007",
            CoreError::IoError(_) => "PROC008",
            CoreError::Other(_) => "PROC999",
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

// Convenience implementations
impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}
