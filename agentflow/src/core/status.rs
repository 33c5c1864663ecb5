//! Worker kind and status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// Wraps a deterministic function (a tool).
    Function,
    /// Chooses its next action through a decision call.
    Delegating,
    /// Runs children one after another.
    Sequential,
    /// Runs children concurrently against isolated views.
    Parallel,
    /// Repeats a body until exit or cap.
    Loop,
    /// Any other leaf worker.
    #[default]
    Custom,
}

impl WorkerKind {
    /// Returns true for the control-flow combinators.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Sequential | Self::Parallel | Self::Loop)
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Delegating => write!(f, "delegating"),
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
            Self::Loop => write!(f, "loop"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The root worker finished.
    Completed,
    /// The run was cancelled; no partial result is reported.
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// State of a loop composer.
///
/// `Exited` and `CapReached` are both successful terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    /// Iterations are still being started.
    #[default]
    Running,
    /// A body worker raised the exit signal.
    Exited,
    /// The iteration counter reached the cap.
    CapReached,
}

impl LoopStatus {
    /// Returns true once no further iterations may begin.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::CapReached => write!(f, "cap_reached"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_kind_display() {
        assert_eq!(WorkerKind::Function.to_string(), "function");
        assert_eq!(WorkerKind::Delegating.to_string(), "delegating");
        assert_eq!(WorkerKind::Loop.to_string(), "loop");
    }

    #[test]
    fn test_worker_kind_is_composite() {
        assert!(WorkerKind::Sequential.is_composite());
        assert!(WorkerKind::Parallel.is_composite());
        assert!(WorkerKind::Loop.is_composite());
        assert!(!WorkerKind::Function.is_composite());
        assert!(!WorkerKind::Delegating.is_composite());
    }

    #[test]
    fn test_loop_status_terminal() {
        assert!(!LoopStatus::Running.is_terminal());
        assert!(LoopStatus::Exited.is_terminal());
        assert!(LoopStatus::CapReached.is_terminal());
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&LoopStatus::CapReached).unwrap();
        assert_eq!(json, r#""cap_reached""#);

        let status: RunStatus = serde_json::from_str(r#""cancelled""#).unwrap();
        assert_eq!(status, RunStatus::Cancelled);
    }
}
