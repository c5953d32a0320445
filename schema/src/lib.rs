//! Schema definitions for proctask
//!
//! This crate contains the shared data structures used across the proctask
//! workspace: process exit records, the expectation policy for bounded
//! process tasks, and the supervisor event types. All types here implement
//! JSON Schema generation for external consumption.

pub mod events;
pub mod process;

pub use events::SupervisorEvent;
pub use process::{Expect, ProcessExit, ProcessToken, TaskOptions};
