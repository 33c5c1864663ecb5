//! Core domain model types for agentflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Worker kind, run status and loop status enums
//! - Worker output type with factory methods
//! - Session events

mod event;
mod output;
mod status;

pub use event::{Event, EventCompaction, SYSTEM_AUTHOR, USER_AUTHOR};
pub use output::WorkerOutput;
pub use status::{LoopStatus, RunStatus, WorkerKind};
