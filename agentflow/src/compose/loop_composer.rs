//! Loop composition.

use super::{external_reads, union_writes, validate_children};
use crate::context::WorkerContext;
use crate::core::{LoopStatus, WorkerKind, WorkerOutput};
use crate::errors::{AgentflowError, ConfigurationError};
use crate::events::LifecycleEvent;
use crate::workers::{invoke, Worker, WorkerRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::debug;

/// Iteration counter, cap and status of a running loop.
///
/// `iteration` counts completed iterations and never exceeds
/// `max_iterations`. Once the status is terminal nothing changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    /// Completed iterations.
    pub iteration: u32,
    /// The cap.
    pub max_iterations: u32,
    /// Current status.
    pub status: LoopStatus,
}

impl LoopState {
    /// Creates the initial state: running, iteration 0.
    #[must_use]
    pub fn new(max_iterations: u32) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            status: LoopStatus::Running,
        }
    }

    /// Records the exit signal.
    pub fn exit(&mut self) {
        if !self.status.is_terminal() {
            self.status = LoopStatus::Exited;
        }
    }

    /// Records a completed iteration, reaching the cap if it was the last.
    pub fn complete_iteration(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.iteration += 1;
        if self.iteration >= self.max_iterations {
            self.status = LoopStatus::CapReached;
        }
    }

    /// Returns true while another iteration may begin.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == LoopStatus::Running
    }

    /// Iterations that began, including one ended early by the exit signal.
    #[must_use]
    pub fn iterations_started(&self) -> u32 {
        match self.status {
            LoopStatus::Exited => self.iteration + 1,
            _ => self.iteration,
        }
    }
}

/// Repeats a fixed body until a child raises the exit signal or the cap is
/// reached. Both are successful outcomes; the signal is consumed here and
/// does not propagate past the loop.
pub struct LoopComposer {
    name: String,
    description: String,
    body: Vec<WorkerRef>,
    max_iterations: Option<u32>,
}

impl LoopComposer {
    /// Creates a loop with an explicit cap.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the body is empty, has duplicate
    /// names, or the cap is zero.
    pub fn new(
        name: impl Into<String>,
        body: Vec<WorkerRef>,
        max_iterations: u32,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if max_iterations == 0 {
            return Err(ConfigurationError::invalid_iteration_cap(&name, max_iterations));
        }
        validate_children(&name, &body)?;
        Ok(Self {
            name,
            description: String::new(),
            body,
            max_iterations: Some(max_iterations),
        })
    }

    /// Creates a loop capped by the run's `default_max_iterations`.
    pub fn with_default_cap(
        name: impl Into<String>,
        body: Vec<WorkerRef>,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        validate_children(&name, &body)?;
        Ok(Self {
            name,
            description: String::new(),
            body,
            max_iterations: None,
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the explicit cap, if any.
    #[must_use]
    pub fn max_iterations(&self) -> Option<u32> {
        self.max_iterations
    }

    /// Runs the loop and returns its final state with the folded output.
    pub async fn run_loop(
        &self,
        ctx: &WorkerContext,
    ) -> Result<(LoopState, WorkerOutput), AgentflowError> {
        let cap = self
            .max_iterations
            .unwrap_or_else(|| ctx.config().default_max_iterations);
        if cap == 0 {
            return Err(ConfigurationError::invalid_iteration_cap(&self.name, cap).into());
        }

        let mut state = LoopState::new(cap);
        let mut output = WorkerOutput::empty();

        while state.is_running() {
            for child in &self.body {
                let child_output = invoke(child.as_ref(), ctx).await?;
                let escalated = child_output.escalate;
                output.absorb(child_output);
                if escalated {
                    state.exit();
                    break;
                }
            }

            if !state.is_running() {
                break;
            }
            state.complete_iteration();
            debug!(composer = %self.name, iteration = state.iteration, "Loop iteration completed");
            ctx.emit(LifecycleEvent::loop_iteration(&self.name, state.iteration));
        }

        debug!(
            composer = %self.name,
            status = %state.status,
            iterations = state.iterations_started(),
            "Loop terminated"
        );
        ctx.emit(LifecycleEvent::loop_terminated(
            &self.name,
            &state.status.to_string(),
            state.iterations_started(),
        ));

        output.escalate = false;
        Ok((state, output))
    }
}

impl fmt::Debug for LoopComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopComposer")
            .field("name", &self.name)
            .field("body", &self.body)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

#[async_trait]
impl Worker for LoopComposer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> WorkerKind {
        WorkerKind::Loop
    }

    fn reads(&self) -> Vec<String> {
        external_reads(&self.body)
    }

    fn declared_writes(&self) -> Vec<String> {
        union_writes(&self.body)
    }

    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
        let (state, output) = self.run_loop(ctx).await?;
        Ok(output
            .add_metadata("loop_status", json!(state.status))
            .add_metadata("iterations", json!(state.iterations_started())))
    }
}
