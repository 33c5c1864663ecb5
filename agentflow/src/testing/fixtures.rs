//! Test fixtures for worker testing.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::context::{ContextBag, RunContext, RunIdentity, WorkerContext};
use crate::events::CollectingEventSink;

/// A worker context builder wired to a collecting sink.
#[derive(Debug, Default)]
pub struct TestContext {
    /// Data to seed the context with.
    pub data: Map<String, Value>,
    /// Engine configuration.
    pub config: EngineConfig,
    /// Receives every lifecycle event.
    pub sink: Arc<CollectingEventSink>,
}

impl TestContext {
    /// Creates a new test context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a context value.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds a worker context for `request`.
    #[must_use]
    pub fn build(&self, request: &str) -> WorkerContext {
        let run = RunContext::new(
            RunIdentity::new("test_app", "test_user", "test_session"),
            Arc::new(self.config.clone()),
            self.sink.clone(),
        );
        WorkerContext::new(
            Arc::new(run),
            Arc::new(ContextBag::from_map(self.data.clone())),
            request,
            Arc::new(CancellationToken::new()),
        )
    }
}
