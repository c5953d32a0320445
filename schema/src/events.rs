//! Event types emitted by the process supervisor
//!
//! Events provide observability into process attribution changes: a new
//! process being spawned, the current process exiting, or the current
//! process reporting an error. They are serializable so they can be logged
//! as structured records or broadcast to multiple subscribers via event
//! channels.

use crate::process::{ProcessExit, ProcessToken};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Events emitted by a process supervisor
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "eventType", rename_all = "camelCase")]
pub enum SupervisorEvent {
    /// A new process has been spawned and attributed
    ProcessSpawned {
        /// Attribution token of the new process
        token: ProcessToken,
        /// Process ID, when the backend exposes one
        #[serde(skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },

    /// The attributed process has exited
    ProcessExited {
        /// Attribution token of the exited process
        token: ProcessToken,
        /// Exit information
        exit: ProcessExit,
    },

    /// The attributed process reported an error
    ProcessFailed {
        /// Attribution token of the failed process
        token: ProcessToken,
        /// Error description
        message: String,
        /// Event timestamp in RFC3339 format
        timestamp: String,
    },
}

impl SupervisorEvent {
    /// Get the attribution token for this event
    #[must_use]
    pub fn token(&self) -> ProcessToken {
        match self {
            Self::ProcessSpawned { token, .. }
            | Self::ProcessExited { token, .. }
            | Self::ProcessFailed { token, .. } => *token,
        }
    }

    /// Get the timestamp for this event
    #[must_use]
    pub fn timestamp(&self) -> &str {
        match self {
            Self::ProcessExited { exit, .. } => &exit.timestamp,
            Self::ProcessSpawned { timestamp, .. } | Self::ProcessFailed { timestamp, .. } => {
                timestamp
            }
        }
    }

    /// Get the current timestamp in RFC3339 format (second precision)
    #[must_use]
    pub fn current_timestamp() -> String {
        humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
    }

    /// Create a process spawned event
    #[must_use]
    pub fn process_spawned(token: ProcessToken, pid: Option<u32>) -> Self {
        Self::ProcessSpawned {
            token,
            pid,
            timestamp: Self::current_timestamp(),
        }
    }

    /// Create a process failed event
    #[must_use]
    pub fn process_failed(token: ProcessToken, message: String) -> Self {
        Self::ProcessFailed {
            token,
            message,
            timestamp: Self::current_timestamp(),
        }
    }
}
