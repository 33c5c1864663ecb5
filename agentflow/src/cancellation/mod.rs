//! Cooperative cancellation for runs and their parallel sub-tasks.
//!
//! This module provides:
//! - CancellationToken for cooperative cancellation with parent/child links
//! - StructuredTaskGroup for joining sibling tasks fail-fast

mod task_group;
mod token;

pub use task_group::StructuredTaskGroup;
pub use token::CancellationToken;
