//! Run and worker execution contexts.

use super::{ContextBag, ContextSnapshot, RunIdentity};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::core::Event;
use crate::events::{EventSink, LifecycleEvent, NoOpEventSink};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Per-run state shared by every worker of one run.
///
/// Holds the run identity, the engine configuration, the event sink and the
/// run's event log. The log is only committed to a session store once the
/// run completes.
#[derive(Debug)]
pub struct RunContext {
    identity: RunIdentity,
    config: Arc<EngineConfig>,
    sink: Arc<dyn EventSink>,
    history: Vec<Event>,
    events: Mutex<Vec<Event>>,
}

impl RunContext {
    /// Creates a new run context.
    #[must_use]
    pub fn new(identity: RunIdentity, config: Arc<EngineConfig>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            identity,
            config,
            sink,
            history: Vec::new(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Sets the prior conversation visible to deciders.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Event>) -> Self {
        self.history = history;
        self
    }

    /// Creates a run context with no session, default config and no sink.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::new(
            RunIdentity::ephemeral(),
            Arc::new(EngineConfig::default()),
            Arc::new(NoOpEventSink),
        )
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the prior conversation, compacted windows replaced by their
    /// summaries.
    #[must_use]
    pub fn history(&self) -> &[Event] {
        &self.history
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Appends an event to the run log.
    pub fn record_event(&self, event: Event) {
        self.events.lock().push(event);
    }

    /// Returns a copy of the run log.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Drains the run log.
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Emits a lifecycle event tagged with the run and session ids.
    pub fn emit(&self, event: LifecycleEvent) {
        let event = event
            .add_data("run_id", json!(self.identity.run_id.to_string()))
            .add_data("session_id", json!(self.identity.session_id));
        self.sink.try_emit(event);
    }
}

/// The view a single worker invocation gets of its run.
///
/// Cloning is cheap. Sequential children share the parent's context bag;
/// parallel children receive a fork via [`WorkerContext::fork_isolated`].
#[derive(Debug, Clone)]
pub struct WorkerContext {
    run: Arc<RunContext>,
    state: Arc<ContextBag>,
    request: Arc<str>,
    args: Arc<Value>,
    cancel: Arc<CancellationToken>,
}

impl WorkerContext {
    /// Creates the context for the root worker of a run.
    #[must_use]
    pub fn new(
        run: Arc<RunContext>,
        state: Arc<ContextBag>,
        request: impl Into<String>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            run,
            state,
            request: Arc::from(request.into()),
            args: Arc::new(Value::Null),
            cancel,
        }
    }

    /// Creates a standalone context for a request, with an empty bag.
    #[must_use]
    pub fn root(request: impl Into<String>) -> Self {
        Self::new(
            Arc::new(RunContext::ephemeral()),
            Arc::new(ContextBag::new()),
            request,
            Arc::new(CancellationToken::new()),
        )
    }

    /// Returns a context sharing this one's bag with a different input.
    #[must_use]
    pub fn with_input(&self, request: impl Into<String>, args: Value) -> Self {
        Self {
            request: Arc::from(request.into()),
            args: Arc::new(args),
            ..self.clone()
        }
    }

    /// Returns a context over a private copy of the bag, observing `cancel`.
    #[must_use]
    pub fn fork_isolated(&self, cancel: Arc<CancellationToken>) -> Self {
        Self {
            state: Arc::new(self.state.fork()),
            cancel,
            ..self.clone()
        }
    }

    /// Returns the user request.
    #[must_use]
    pub fn request(&self) -> &str {
        &self.request
    }

    /// Returns the structured arguments (`Null` unless called as a tool).
    #[must_use]
    pub fn args(&self) -> &Value {
        &self.args
    }

    /// Returns the context bag.
    #[must_use]
    pub fn state(&self) -> &Arc<ContextBag> {
        &self.state
    }

    /// Takes a snapshot of the context bag.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        self.state.snapshot()
    }

    /// Gets a context value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.get(key)
    }

    /// Returns the run context.
    #[must_use]
    pub fn run(&self) -> &Arc<RunContext> {
        &self.run
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        self.run.identity()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.run.config()
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Returns true if the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Emits a lifecycle event.
    pub fn emit(&self, event: LifecycleEvent) {
        self.run.emit(event);
    }
}
