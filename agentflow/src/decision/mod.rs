//! The decision capability behind delegating workers.
//!
//! A [`Decider`] is the opaque oracle that, given a request, a context
//! snapshot and the catalogue of callable sub-workers, returns the next
//! action: either a final reply or a list of tool calls. Model access,
//! transport and prompting live behind this trait; the engine only wraps
//! calls in the configured [`RetryOptions`].

mod retry;

pub use retry::{with_retry, JitterStrategy, RetryOptions};

use crate::context::ContextSnapshot;
use crate::core::{Event, WorkerKind};
use crate::errors::DecisionFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A sub-worker as advertised to a decider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// The sub-worker's name; tool calls refer to it.
    pub name: String,
    /// What the sub-worker does.
    pub description: String,
    /// The sub-worker's kind.
    pub kind: WorkerKind,
}

/// A request to invoke a named sub-worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates the call with its step record.
    pub id: String,
    /// The sub-worker to invoke.
    pub name: String,
    /// Structured arguments. Agent-backed sub-workers read `request`.
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    /// Creates a call with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            args,
        }
    }

    /// Creates a call that hands `request` to an agent-backed sub-worker.
    #[must_use]
    pub fn request(name: impl Into<String>, request: impl Into<String>) -> Self {
        Self::new(name, serde_json::json!({ "request": request.into() }))
    }
}

/// The outcome of one tool call, fed back to the decider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// The call that was made.
    pub call: ToolCall,
    /// The sub-worker's primary result, or a structured error.
    pub result: Value,
    /// Whether the call could not be dispatched.
    #[serde(default)]
    pub is_error: bool,
}

/// Everything a decider sees for one decision.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    /// The deciding worker's name.
    pub worker: String,
    /// The instruction, with context placeholders resolved.
    pub instruction: String,
    /// The user request.
    pub request: String,
    /// The context at decision time.
    pub context: ContextSnapshot,
    /// Sub-workers that may be called.
    pub available: Vec<WorkerSpec>,
    /// Calls made so far in this invocation.
    pub steps: Vec<StepRecord>,
    /// Earlier turns of the session.
    pub history: Vec<Event>,
}

impl DecisionRequest {
    /// Returns the step records of calls to `name`.
    #[must_use]
    pub fn steps_for(&self, name: &str) -> Vec<&StepRecord> {
        self.steps.iter().filter(|s| s.call.name == name).collect()
    }
}

/// The next action chosen by a decider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Reply text; final when there are no tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Sub-workers to invoke, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Named outputs to write into the context.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
}

impl Decision {
    /// A final reply.
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A single tool call.
    #[must_use]
    pub fn call(call: ToolCall) -> Self {
        Self::calls(vec![call])
    }

    /// Several tool calls, invoked in order.
    #[must_use]
    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::default()
        }
    }

    /// Adds a named output.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, value: Value) -> Self {
        self.outputs.insert(key.into(), value);
        self
    }

    /// Whether this decision ends the step loop.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// The external decision capability.
#[async_trait]
pub trait Decider: Send + Sync + std::fmt::Debug {
    /// Chooses the next action.
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision, DecisionFailure>;
}
