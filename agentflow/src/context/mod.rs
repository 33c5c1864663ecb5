//! Run context management.
//!
//! This module provides:
//! - The shared, insertion-ordered context bag and its scoped keys
//! - Immutable snapshots handed to parallel workers and decision calls
//! - Run and worker execution contexts
//! - Instruction templates resolved against the context

mod bags;
mod execution;
mod identity;
mod scope;
mod snapshot;
mod template;

pub use bags::{merge_isolated_writes, ContextBag};
pub use execution::{RunContext, WorkerContext};
pub use identity::{RunIdentity, DEFAULT_APP_NAME, DEFAULT_USER_ID};
pub use scope::ContextScope;
pub use snapshot::ContextSnapshot;
pub use template::{render_instruction, template_keys};
