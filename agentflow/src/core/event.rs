//! Session events.

use super::WorkerOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Author used for user messages.
pub const USER_AUTHOR: &str = "user";

/// Author used for system-generated events such as compaction.
pub const SYSTEM_AUTHOR: &str = "system";

/// A summary replacing a window of earlier events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCompaction {
    /// Timestamp of the first summarized event.
    pub start_timestamp: DateTime<Utc>,
    /// Timestamp of the last summarized event.
    pub end_timestamp: DateTime<Utc>,
    /// Invocations covered by the summary, in order.
    pub invocation_ids: Vec<Uuid>,
    /// The summary text.
    pub summary: String,
}

/// An entry in a session's append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id.
    pub id: Uuid,

    /// The run (invocation) that produced the event.
    pub invocation_id: Uuid,

    /// The worker name, `user` or `system`.
    pub author: String,

    /// When the event was created.
    pub timestamp: DateTime<Utc>,

    /// Text content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Context writes carried by the event.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state_delta: Map<String, Value>,

    /// Whether the author raised the exit signal.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub escalate: bool,

    /// Compaction payload, for summary events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compaction: Option<EventCompaction>,
}

impl Event {
    /// Creates an empty event.
    #[must_use]
    pub fn new(invocation_id: Uuid, author: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            invocation_id,
            author: author.into(),
            timestamp: Utc::now(),
            text: None,
            state_delta: Map::new(),
            escalate: false,
            compaction: None,
        }
    }

    /// Creates the event recording the user's request.
    #[must_use]
    pub fn user_message(invocation_id: Uuid, text: impl Into<String>) -> Self {
        Self::new(invocation_id, USER_AUTHOR).with_text(text)
    }

    /// Creates the event recording a worker's output.
    #[must_use]
    pub fn from_output(invocation_id: Uuid, author: impl Into<String>, output: &WorkerOutput) -> Self {
        Self {
            text: output.text.clone(),
            state_delta: output.state_delta.clone(),
            escalate: output.escalate,
            ..Self::new(invocation_id, author)
        }
    }

    /// Creates a compaction event.
    #[must_use]
    pub fn compaction(invocation_id: Uuid, compaction: EventCompaction) -> Self {
        Self {
            compaction: Some(compaction),
            ..Self::new(invocation_id, SYSTEM_AUTHOR)
        }
    }

    /// Sets the text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Adds a context write.
    #[must_use]
    pub fn with_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state_delta.insert(key.into(), value);
        self
    }

    /// Returns true if this is a compaction event.
    #[must_use]
    pub fn is_compaction(&self) -> bool {
        self.compaction.is_some()
    }
}
