//! Sequential composition.

use super::{external_reads, union_writes, validate_children};
use crate::context::WorkerContext;
use crate::core::{WorkerKind, WorkerOutput};
use crate::errors::{AgentflowError, ConfigurationError};
use crate::workers::{invoke, Worker, WorkerRef};
use async_trait::async_trait;
use std::fmt;
use tracing::debug;

/// Runs children in order against one shared context.
///
/// Each child sees every write of the children before it. The result is the
/// last child's result; the first failure aborts the rest. A child raising
/// the exit signal stops the sequence and the signal propagates upward.
pub struct SequentialComposer {
    name: String,
    description: String,
    children: Vec<WorkerRef>,
}

impl SequentialComposer {
    /// Creates a sequential composer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `children` is empty or has duplicate names.
    pub fn new(name: impl Into<String>, children: Vec<WorkerRef>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        validate_children(&name, &children)?;
        Ok(Self {
            name,
            description: String::new(),
            children,
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the children, in order.
    #[must_use]
    pub fn children(&self) -> &[WorkerRef] {
        &self.children
    }
}

impl fmt::Debug for SequentialComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialComposer")
            .field("name", &self.name)
            .field("children", &self.children)
            .finish()
    }
}

#[async_trait]
impl Worker for SequentialComposer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> WorkerKind {
        WorkerKind::Sequential
    }

    fn reads(&self) -> Vec<String> {
        external_reads(&self.children)
    }

    fn declared_writes(&self) -> Vec<String> {
        union_writes(&self.children)
    }

    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
        let mut output = WorkerOutput::empty();

        for child in &self.children {
            let child_output = invoke(child.as_ref(), ctx).await?;
            let escalated = child_output.escalate;
            output.absorb(child_output);

            if escalated {
                debug!(composer = %self.name, worker = %child.name(), "Exit signal raised, stopping sequence");
                break;
            }
        }

        Ok(output)
    }
}
