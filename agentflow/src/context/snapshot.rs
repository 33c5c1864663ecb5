//! Immutable context snapshots.

use super::ContextScope;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A frozen, cheaply clonable view of a run context.
///
/// Parallel siblings and decision calls receive snapshots, so nothing they
/// do can be observed by another worker until the owning composer applies it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    data: Arc<Map<String, Value>>,
}

impl ContextSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a snapshot from a map.
    #[must_use]
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Gets a string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns all keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Returns only the entries of one scope.
    #[must_use]
    pub fn scoped(&self, scope: ContextScope) -> Map<String, Value> {
        self.data
            .iter()
            .filter(|(key, _)| ContextScope::of(key) == scope)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object((*self.data).clone())
    }
}
