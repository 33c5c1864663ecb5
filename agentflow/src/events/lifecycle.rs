//! Lifecycle event type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// An event describing a step in the life of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// The event type (e.g. "worker.started", "loop.iteration").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// The event payload.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl LifecycleEvent {
    /// Creates an event with no payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            data: Map::new(),
        }
    }

    /// Adds a data field.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Gets a data field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// A worker invocation began.
    #[must_use]
    pub fn worker_started(worker: &str, kind: &str) -> Self {
        Self::new("worker.started")
            .add_data("worker", json!(worker))
            .add_data("kind", json!(kind))
    }

    /// A worker invocation finished.
    #[must_use]
    pub fn worker_completed(worker: &str, duration_ms: f64, escalate: bool) -> Self {
        Self::new("worker.completed")
            .add_data("worker", json!(worker))
            .add_data("duration_ms", json!(duration_ms))
            .add_data("escalate", json!(escalate))
    }

    /// A worker invocation failed.
    #[must_use]
    pub fn worker_failed(worker: &str, error: &str) -> Self {
        Self::new("worker.failed")
            .add_data("worker", json!(worker))
            .add_data("error", json!(error))
    }

    /// A loop iteration completed.
    #[must_use]
    pub fn loop_iteration(composer: &str, iteration: u32) -> Self {
        Self::new("loop.iteration")
            .add_data("worker", json!(composer))
            .add_data("iteration", json!(iteration))
    }

    /// A loop stopped, by exit signal or by reaching its cap.
    #[must_use]
    pub fn loop_terminated(composer: &str, status: &str, iterations: u32) -> Self {
        Self::new("loop.terminated")
            .add_data("worker", json!(composer))
            .add_data("status", json!(status))
            .add_data("iterations", json!(iterations))
    }

    /// A delegating worker called a sub-worker.
    #[must_use]
    pub fn delegation(worker: &str, target: &str, step: usize) -> Self {
        Self::new("worker.delegated")
            .add_data("worker", json!(worker))
            .add_data("target", json!(target))
            .add_data("step", json!(step))
    }

    /// A run committed its events.
    #[must_use]
    pub fn run_completed(session_id: &str, events: usize) -> Self {
        Self::new("run.completed")
            .add_data("session_id", json!(session_id))
            .add_data("events", json!(events))
    }

    /// A run was cancelled and committed nothing.
    #[must_use]
    pub fn run_cancelled(session_id: &str, reason: &str) -> Self {
        Self::new("run.cancelled")
            .add_data("session_id", json!(session_id))
            .add_data("reason", json!(reason))
    }

    /// A session's history was compacted.
    #[must_use]
    pub fn session_compacted(session_id: &str, invocations: usize) -> Self {
        Self::new("session.compacted")
            .add_data("session_id", json!(session_id))
            .add_data("invocations", json!(invocations))
    }
}
