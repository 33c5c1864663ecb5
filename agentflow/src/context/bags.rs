//! The thread-safe run context bag.

use super::ContextSnapshot;
use crate::errors::ConfigurationError;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A thread-safe, insertion-ordered key-value store shared by the workers of
/// one run.
///
/// Writes overwrite: a loop body may rewrite the same key every iteration.
/// Isolation for parallel siblings comes from [`ContextBag::fork`], not from
/// write-once semantics.
#[derive(Debug, Default)]
pub struct ContextBag {
    data: RwLock<Map<String, Value>>,
}

impl ContextBag {
    /// Creates a new empty context bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context bag from existing data.
    #[must_use]
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Gets a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Sets a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.write().insert(key.into(), value)
    }

    /// Applies a batch of writes in order.
    pub fn apply(&self, writes: &Map<String, Value>) {
        if writes.is_empty() {
            return;
        }
        let mut data = self.data.write();
        for (key, value) in writes {
            data.insert(key.clone(), value.clone());
        }
    }

    /// Takes an immutable snapshot of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot::from_map(self.data.read().clone())
    }

    /// Creates an independent copy for an isolated worker.
    #[must_use]
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        self.data.read().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns all keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }
}

impl Clone for ContextBag {
    fn clone(&self) -> Self {
        Self {
            data: RwLock::new(self.data.read().clone()),
        }
    }
}

/// Merges the writes of isolated sibling workers into one delta.
///
/// `writes` pairs each worker name with its writes, in declaration order.
/// The merged map is the union of all writes; because keys must be
/// disjoint, the result does not depend on which sibling finished first.
///
/// # Errors
///
/// Returns `ConfigurationError` (`OutputKeyCollision`) if two siblings wrote
/// the same key.
pub fn merge_isolated_writes(
    writes: Vec<(String, Map<String, Value>)>,
) -> Result<Map<String, Value>, ConfigurationError> {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut merged = Map::new();

    for (worker, delta) in writes {
        for (key, value) in delta {
            if let Some(owner) = owners.get(&key) {
                return Err(ConfigurationError::output_key_collision(
                    &key,
                    vec![owner.clone(), worker],
                ));
            }
            owners.insert(key.clone(), worker.clone());
            merged.insert(key, value);
        }
    }

    Ok(merged)
}
