//! Error types for agentflow.
//!
//! The taxonomy separates configuration mistakes (fatal, never retried),
//! decision failures (retried by policy, then surfaced), malformed tool
//! input (hard errors) and cancellation. A function worker's structured
//! error result is *not* an error here: it travels as data.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The main error type for agentflow operations.
#[derive(Debug, Error)]
pub enum AgentflowError {
    /// A composition or configuration mistake.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The external decision call failed after retries.
    #[error("{0}")]
    Decision(#[from] DecisionFailure),

    /// The run was cancelled.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// A worker raised a hard failure.
    #[error("Worker '{worker}' failed: {message}")]
    Worker {
        /// The failing worker.
        worker: String,
        /// The failure message.
        message: String,
    },

    /// A function worker was invoked with malformed input.
    #[error("{0}")]
    Tool(#[from] ToolInvocationError),

    /// A session store operation failed.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentflowError {
    /// Creates a hard worker failure.
    #[must_use]
    pub fn worker(worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Worker {
            worker: worker.into(),
            message: message.into(),
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Returns true if this error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns true if this error is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns the configuration error kind, if this is one.
    #[must_use]
    pub fn configuration_kind(&self) -> Option<ConfigurationErrorKind> {
        match self {
            Self::Configuration(err) => Some(err.kind),
            _ => None,
        }
    }
}

/// Machine-readable category of a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationErrorKind {
    /// Two parallel siblings write the same context key.
    OutputKeyCollision,
    /// Two workers in one composer share a name.
    DuplicateWorkerName,
    /// A composer was built with no workers.
    EmptyComposition,
    /// A loop was built with an iteration cap of zero.
    InvalidIterationCap,
    /// An instruction template references a key absent from the context.
    MissingContextKey,
    /// A configuration value is out of range or unparsable.
    InvalidConfig,
}

impl ConfigurationErrorKind {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutputKeyCollision => "CONFIG-001-COLLISION",
            Self::DuplicateWorkerName => "CONFIG-002-DUPLICATE",
            Self::EmptyComposition => "CONFIG-003-EMPTY",
            Self::InvalidIterationCap => "CONFIG-004-CAP",
            Self::MissingContextKey => "CONFIG-005-MISSING_KEY",
            Self::InvalidConfig => "CONFIG-006-INVALID",
        }
    }
}

impl fmt::Display for ConfigurationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error raised when a composition is malformed.
#[derive(Debug, Clone, Error)]
#[error("[{kind}] {message}")]
pub struct ConfigurationError {
    /// The error category.
    pub kind: ConfigurationErrorKind,
    /// Human-readable message.
    pub message: String,
    /// The workers involved.
    pub workers: Vec<String>,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(kind: ConfigurationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            workers: Vec::new(),
            fix_hint: None,
        }
    }

    /// Sets the workers involved.
    #[must_use]
    pub fn with_workers(mut self, workers: Vec<String>) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Two parallel siblings wrote the same key.
    #[must_use]
    pub fn output_key_collision(key: &str, workers: Vec<String>) -> Self {
        Self::new(
            ConfigurationErrorKind::OutputKeyCollision,
            format!(
                "Parallel workers {} both write context key '{key}'",
                workers.join(", ")
            ),
        )
        .with_workers(workers)
        .with_fix_hint("Give each parallel worker its own output key.")
    }

    /// Two workers in the same composer share a name.
    #[must_use]
    pub fn duplicate_worker_name(composer: &str, name: &str) -> Self {
        Self::new(
            ConfigurationErrorKind::DuplicateWorkerName,
            format!("Composer '{composer}' contains worker '{name}' more than once"),
        )
        .with_workers(vec![composer.to_string(), name.to_string()])
    }

    /// A composer has no workers.
    #[must_use]
    pub fn empty_composition(composer: &str) -> Self {
        Self::new(
            ConfigurationErrorKind::EmptyComposition,
            format!("Composer '{composer}' has no workers"),
        )
        .with_workers(vec![composer.to_string()])
        .with_fix_hint("Add at least one worker before running.")
    }

    /// A loop cap of zero.
    #[must_use]
    pub fn invalid_iteration_cap(composer: &str, cap: u32) -> Self {
        Self::new(
            ConfigurationErrorKind::InvalidIterationCap,
            format!("Loop '{composer}' has invalid iteration cap {cap}"),
        )
        .with_workers(vec![composer.to_string()])
        .with_fix_hint("Use a cap of at least 1.")
    }

    /// An instruction placeholder with no context value.
    #[must_use]
    pub fn missing_context_key(worker: &str, key: &str) -> Self {
        Self::new(
            ConfigurationErrorKind::MissingContextKey,
            format!("Worker '{worker}' references context key '{key}' which is not set"),
        )
        .with_workers(vec![worker.to_string()])
        .with_fix_hint(format!("Write '{key}' earlier in the run or use '{{{key}?}}'."))
    }

    /// An invalid configuration value.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ConfigurationErrorKind::InvalidConfig, message)
    }
}

/// Error raised when the external decision/generation call fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Decision failed for '{worker}': {message}")]
pub struct DecisionFailure {
    /// The worker that requested the decision.
    pub worker: String,
    /// Failure description.
    pub message: String,
    /// Transport status code, when the failure carries one.
    pub status_code: Option<u16>,
    /// Whether the call timed out.
    pub timed_out: bool,
}

impl DecisionFailure {
    /// Creates a new decision failure.
    #[must_use]
    pub fn new(worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            message: message.into(),
            status_code: None,
            timed_out: false,
        }
    }

    /// Attaches a status code.
    #[must_use]
    pub fn with_status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Creates a timeout failure.
    #[must_use]
    pub fn timeout(worker: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::new(worker, "decision call timed out")
        }
    }

    /// Creates a failure for a delegating worker that ran out of steps.
    #[must_use]
    pub fn step_limit(worker: impl Into<String>, max_steps: usize) -> Self {
        Self::new(
            worker,
            format!("no final reply after {max_steps} decision steps"),
        )
    }

    /// Returns true if the failure should be retried under the given status codes.
    #[must_use]
    pub fn is_retryable(&self, retryable_codes: &[u16]) -> bool {
        self.timed_out
            || self
                .status_code
                .is_some_and(|code| retryable_codes.contains(&code))
    }
}

/// Errors raised when a function worker receives malformed input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolInvocationError {
    /// Arguments were not a JSON object.
    #[error("Malformed arguments for tool '{tool}': {reason}")]
    MalformedArguments {
        /// The tool name.
        tool: String,
        /// What was wrong.
        reason: String,
    },

    /// A required argument was absent.
    #[error("Tool '{tool}' is missing required argument '{argument}'")]
    MissingArgument {
        /// The tool name.
        tool: String,
        /// The missing argument.
        argument: String,
    },

    /// The tool function raised instead of returning a result.
    #[error("Tool '{tool}' raised: {reason}")]
    Raised {
        /// The tool name.
        tool: String,
        /// The reason.
        reason: String,
    },
}

impl ToolInvocationError {
    /// Creates a malformed-arguments error.
    #[must_use]
    pub fn malformed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing-argument error.
    #[must_use]
    pub fn missing_argument(tool: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::MissingArgument {
            tool: tool.into(),
            argument: argument.into(),
        }
    }

    /// Creates a raised error.
    #[must_use]
    pub fn raised(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Raised {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from session stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session does not exist.
    #[error("Session not found: {app_name}/{user_id}/{session_id}")]
    NotFound {
        /// App name.
        app_name: String,
        /// User id.
        user_id: String,
        /// Session id.
        session_id: String,
    },

    /// A session with that id already exists.
    #[error("Session already exists: {app_name}/{user_id}/{session_id}")]
    AlreadyExists {
        /// App name.
        app_name: String,
        /// User id.
        user_id: String,
        /// Session id.
        session_id: String,
    },

    /// The backing storage failed.
    #[error("Session persistence failed: {0}")]
    Persistence(String),
}
