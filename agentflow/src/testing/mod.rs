//! Testing utilities for worker compositions.
//!
//! This module provides:
//! - Mock workers that record, delay or fail
//! - Scripted and failing deciders standing in for a model
//! - A context builder wired to a collecting event sink

mod deciders;
mod fixtures;
mod mocks;

pub use crate::workers::FnWorker;
pub use deciders::{FailingDecider, ScriptedDecider};
pub use fixtures::TestContext;
pub use mocks::{FailingWorker, RecordingWorker, SlowWorker};
