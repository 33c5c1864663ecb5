//! Control-flow composers.
//!
//! - [`SequentialComposer`] runs children one after another on a shared context
//! - [`ParallelComposer`] runs children concurrently on isolated forks and
//!   merges their writes at a single join
//! - [`LoopComposer`] repeats a body until a child raises the exit signal or
//!   the iteration cap is reached
//!
//! All composers fail fast: the first child failure aborts the composition.

mod loop_composer;
mod parallel;
mod sequential;

pub use loop_composer::{LoopComposer, LoopState};
pub use parallel::ParallelComposer;
pub use sequential::SequentialComposer;

use crate::errors::ConfigurationError;
use crate::workers::WorkerRef;
use std::collections::HashSet;

/// Checks that a child list is non-empty and its names are unique.
pub(crate) fn validate_children(
    composer: &str,
    children: &[WorkerRef],
) -> Result<(), ConfigurationError> {
    if children.is_empty() {
        return Err(ConfigurationError::empty_composition(composer));
    }

    let mut seen = HashSet::new();
    for child in children {
        if !seen.insert(child.name()) {
            return Err(ConfigurationError::duplicate_worker_name(composer, child.name()));
        }
    }
    Ok(())
}

/// Declared writes of a child list, in order, without duplicates.
pub(crate) fn union_writes(children: &[WorkerRef]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for key in children.iter().flat_map(|c| c.declared_writes()) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Reads of a child list that no earlier child writes.
pub(crate) fn external_reads(children: &[WorkerRef]) -> Vec<String> {
    let mut written: HashSet<String> = HashSet::new();
    let mut reads: Vec<String> = Vec::new();
    for child in children {
        for key in child.reads() {
            if !written.contains(&key) && !reads.contains(&key) {
                reads.push(key);
            }
        }
        written.extend(child.declared_writes());
    }
    reads
}
