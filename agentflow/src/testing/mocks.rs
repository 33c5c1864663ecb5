//! Mock workers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::context::{ContextSnapshot, WorkerContext};
use crate::core::WorkerOutput;
use crate::errors::AgentflowError;
use crate::workers::Worker;

/// A worker that replies with fixed text and records what it saw.
#[derive(Debug)]
pub struct RecordingWorker {
    name: String,
    reply: String,
    output_key: Option<String>,
    delay: Duration,
    seen: Mutex<Vec<ContextSnapshot>>,
    requests: Mutex<Vec<String>>,
}

impl RecordingWorker {
    /// Creates a recording worker.
    #[must_use]
    pub fn new(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reply: reply.into(),
            output_key: None,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sets the output key.
    #[must_use]
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Sleeps before replying.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the context snapshot taken at each call.
    #[must_use]
    pub fn seen(&self) -> Vec<ContextSnapshot> {
        self.seen.lock().clone()
    }

    /// Returns the request of each call.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Worker for RecordingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
        self.seen.lock().push(ctx.snapshot());
        self.requests.lock().push(ctx.request().to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(WorkerOutput::text(self.reply.clone()))
    }
}

/// A worker that takes time and stops early when cancelled.
#[derive(Debug)]
pub struct SlowWorker {
    name: String,
    delay: Duration,
    writes: Map<String, Value>,
}

impl SlowWorker {
    /// Creates a slow worker.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            writes: Map::new(),
        }
    }

    /// Adds an undeclared context write made when the delay elapses.
    #[must_use]
    pub fn with_write(mut self, key: impl Into<String>, value: Value) -> Self {
        self.writes.insert(key.into(), value);
        self
    }
}

#[async_trait]
impl Worker for SlowWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
        tokio::select! {
            () = ctx.cancel_token().cancelled() => Err(AgentflowError::cancelled(
                ctx.cancel_token().reason().unwrap_or_default(),
            )),
            () = tokio::time::sleep(self.delay) => {
                Ok(WorkerOutput::text(self.name.clone()).with_writes(self.writes.clone()))
            }
        }
    }
}

/// A worker that always raises.
#[derive(Debug)]
pub struct FailingWorker {
    name: String,
    message: String,
}

impl FailingWorker {
    /// Creates a failing worker.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Worker for FailingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
        Err(AgentflowError::worker(&self.name, &self.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::invoke;

    #[tokio::test]
    async fn test_recording_worker() {
        let worker = RecordingWorker::new("rec", "hello").with_output_key("greeting");
        let ctx = WorkerContext::root("hi");

        let output = invoke(&worker, &ctx).await.unwrap();

        assert_eq!(output.text.as_deref(), Some("hello"));
        assert_eq!(worker.calls(), 1);
        assert_eq!(worker.requests(), vec!["hi"]);
    }

    #[tokio::test]
    async fn test_slow_worker_observes_cancellation() {
        let worker = SlowWorker::new("slow", Duration::from_secs(10));
        let ctx = WorkerContext::root("hi");
        ctx.cancel_token().cancel("stop");

        let err = worker.run(&ctx).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_failing_worker() {
        let worker = FailingWorker::new("bad", "boom");
        let err = invoke(&worker, &WorkerContext::root("hi")).await.unwrap_err();
        assert_eq!(err.to_string(), AgentflowError::worker("bad", "boom").to_string());
    }
}
