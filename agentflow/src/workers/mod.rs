//! The worker contract and the invocation layer.
//!
//! Every unit of work, leaf or composite, implements [`Worker`]. Callers never
//! call [`Worker::run`] directly; they go through [`invoke`], which handles
//! cancellation, output keys, the run log and lifecycle events uniformly.
//!
//! After `invoke` returns `Ok`, the caller's context bag reflects every write
//! the worker made.

mod delegating;
mod function;

pub use delegating::DelegatingWorker;
pub use function::{
    FunctionWorker, ParameterSpec, ParameterType, ToolContext, ToolResult, ToolStatus,
};

use crate::context::WorkerContext;
use crate::core::{Event, WorkerKind, WorkerOutput};
use crate::errors::AgentflowError;
use crate::events::LifecycleEvent;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

/// A unit of work composed into a run.
///
/// Workers are constructed once and are stateless between runs; everything
/// they remember lives in the context.
#[async_trait]
pub trait Worker: Send + Sync + Debug {
    /// Returns the worker's name, unique among its siblings.
    fn name(&self) -> &str;

    /// Describes what the worker does, for delegating workers' catalogues.
    fn description(&self) -> &str {
        ""
    }

    /// Returns the worker's kind.
    fn kind(&self) -> WorkerKind {
        WorkerKind::Custom
    }

    /// The context key that receives the worker's primary result.
    fn output_key(&self) -> Option<&str> {
        None
    }

    /// Context keys the worker reads.
    fn reads(&self) -> Vec<String> {
        Vec::new()
    }

    /// Context keys the worker is known to write.
    fn declared_writes(&self) -> Vec<String> {
        self.output_key().map(str::to_string).into_iter().collect()
    }

    /// Performs the work.
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError>;
}

/// A shared, type-erased worker.
pub type WorkerRef = Arc<dyn Worker>;

/// Invokes a worker against a context.
///
/// Leaf workers get their primary result stored under their output key,
/// their writes applied to `ctx`'s bag and an event appended to the run log.
/// Composite workers manage their children's writes themselves.
///
/// # Errors
///
/// Returns `AgentflowError::Cancelled` if the run is cancelled before or
/// during the call, or whatever the worker raised.
pub async fn invoke(worker: &dyn Worker, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
    if ctx.is_cancelled() {
        return Err(cancelled_error(ctx));
    }

    let name = worker.name();
    let kind = worker.kind();
    let span = info_span!(
        "worker",
        worker = %name,
        kind = %kind,
        run_id = %ctx.identity().run_id,
    );

    async move {
        debug!("Worker started");
        ctx.emit(LifecycleEvent::worker_started(name, &kind.to_string()));
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            () = ctx.cancel_token().cancelled() => Err(cancelled_error(ctx)),
            result = worker.run(ctx) => result,
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(mut output) => {
                if !kind.is_composite() {
                    if let (Some(key), Some(value)) = (worker.output_key(), output.primary()) {
                        output.state_delta.insert(key.to_string(), value);
                    }
                    ctx.state().apply(&output.state_delta);
                    ctx.run()
                        .record_event(Event::from_output(ctx.identity().run_id, name, &output));
                }
                debug!(elapsed_ms, escalate = output.escalate, "Worker completed");
                ctx.emit(LifecycleEvent::worker_completed(name, elapsed_ms, output.escalate));
                Ok(output)
            }
            Err(e) => {
                debug!(elapsed_ms, error = %e, "Worker failed");
                ctx.emit(LifecycleEvent::worker_failed(name, &e.to_string()));
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

fn cancelled_error(ctx: &WorkerContext) -> AgentflowError {
    AgentflowError::cancelled(
        ctx.cancel_token()
            .reason()
            .unwrap_or_else(|| "cancelled".to_string()),
    )
}

type WorkerFn = dyn Fn(&WorkerContext) -> Result<WorkerOutput, AgentflowError> + Send + Sync;

/// A worker backed by a synchronous closure.
pub struct FnWorker {
    name: String,
    description: String,
    output_key: Option<String>,
    reads: Vec<String>,
    func: Box<WorkerFn>,
}

impl FnWorker {
    /// Creates a closure worker.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&WorkerContext) -> Result<WorkerOutput, AgentflowError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            output_key: None,
            reads: Vec::new(),
            func: Box::new(func),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the output key.
    #[must_use]
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Declares the context keys the closure reads.
    #[must_use]
    pub fn with_reads(mut self, keys: &[&str]) -> Self {
        self.reads = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }
}

impl Debug for FnWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnWorker")
            .field("name", &self.name)
            .field("output_key", &self.output_key)
            .finish()
    }
}

#[async_trait]
impl Worker for FnWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    fn reads(&self) -> Vec<String> {
        self.reads.clone()
    }

    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
        (self.func)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RunContext, RunIdentity};
    use crate::events::CollectingEventSink;
    use crate::testing::SlowWorker;
    use serde_json::json;
    use std::time::Duration;

    fn upper() -> FnWorker {
        FnWorker::new("uppercase", |ctx| Ok(WorkerOutput::text(ctx.request().to_uppercase())))
            .with_output_key("upper")
    }

    #[tokio::test]
    async fn test_invoke_writes_output_key() {
        let ctx = WorkerContext::root("abc");
        let output = invoke(&upper(), &ctx).await.unwrap();

        assert_eq!(output.text.as_deref(), Some("ABC"));
        assert_eq!(output.get("upper"), Some(&json!("ABC")));
        assert_eq!(ctx.get("upper"), Some(json!("ABC")));
    }

    #[tokio::test]
    async fn test_invoke_records_event() {
        let ctx = WorkerContext::root("abc");
        invoke(&upper(), &ctx).await.unwrap();

        let events = ctx.run().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].author, "uppercase");
        assert_eq!(events[0].invocation_id, ctx.identity().run_id);
        assert_eq!(events[0].state_delta.get("upper"), Some(&json!("ABC")));
    }

    #[tokio::test]
    async fn test_invoke_emits_lifecycle_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let run = Arc::new(RunContext::new(
            RunIdentity::ephemeral(),
            Arc::default(),
            sink.clone(),
        ));
        let ctx = WorkerContext::new(run, Arc::default(), "abc", Arc::default());

        invoke(&upper(), &ctx).await.unwrap();
        let failing = FnWorker::new("broken", |_| Err(AgentflowError::worker("broken", "boom")));
        assert!(invoke(&failing, &ctx).await.is_err());

        assert_eq!(
            sink.event_types(),
            vec!["worker.started", "worker.completed", "worker.started", "worker.failed"]
        );
    }

    #[tokio::test]
    async fn test_invoke_refuses_when_cancelled() {
        let ctx = WorkerContext::root("abc");
        ctx.cancel_token().cancel("user abort");

        let err = invoke(&upper(), &ctx).await.unwrap_err();
        assert!(matches!(err, AgentflowError::Cancelled(ref r) if r == "user abort"));
        assert!(ctx.run().events().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_interrupts_running_worker() {
        let ctx = WorkerContext::root("abc");
        let token = ctx.cancel_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel("timeout");
        });

        let slow = SlowWorker::new("slow", Duration::from_secs(10));
        let err = invoke(&slow, &ctx).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_declared_writes_default_to_output_key() {
        assert_eq!(upper().declared_writes(), vec!["upper"]);
        assert!(FnWorker::new("x", |_| Ok(WorkerOutput::empty())).declared_writes().is_empty());
    }
}
