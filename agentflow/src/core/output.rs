//! Worker output type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The output of a worker invocation.
///
/// `state_delta` holds the context writes the worker wants applied, in write
/// order. For leaf workers the invocation layer adds the primary result under
/// the worker's output key; composites report the union of their children's
/// writes so an enclosing composer can propagate them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutput {
    /// The textual result, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// A structured primary result (e.g. a tool result).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Context writes, in order.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state_delta: Map<String, Value>,

    /// Whether the worker raised the loop exit signal.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub escalate: bool,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl WorkerOutput {
    /// Creates an output with no text and no writes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an output carrying text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Creates an output carrying a structured value.
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Adds a context write.
    #[must_use]
    pub fn with_write(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state_delta.insert(key.into(), value);
        self
    }

    /// Adds several context writes.
    #[must_use]
    pub fn with_writes(mut self, writes: Map<String, Value>) -> Self {
        self.state_delta.extend(writes);
        self
    }

    /// Raises the exit signal.
    #[must_use]
    pub fn escalated(mut self) -> Self {
        self.escalate = true;
        self
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn add_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The value written under a worker's output key: the structured value
    /// when present, otherwise the text.
    #[must_use]
    pub fn primary(&self) -> Option<Value> {
        self.value
            .clone()
            .or_else(|| self.text.clone().map(Value::String))
    }

    /// Folds a child's output into this composite output.
    ///
    /// Writes are merged (later wins), the result becomes the child's result
    /// and the exit signal is sticky.
    pub fn absorb(&mut self, child: Self) {
        self.state_delta.extend(child.state_delta);
        self.text = child.text;
        self.value = child.value;
        self.escalate |= child.escalate;
    }

    /// Gets a value from the writes.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state_delta.get(key)
    }
}
