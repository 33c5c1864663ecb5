//! Parallel composition.

use super::{union_writes, validate_children};
use crate::cancellation::StructuredTaskGroup;
use crate::context::{merge_isolated_writes, WorkerContext};
use crate::core::{WorkerKind, WorkerOutput};
use crate::errors::{AgentflowError, ConfigurationError};
use crate::workers::{invoke, Worker, WorkerRef};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Runs children concurrently, each on an isolated copy of the context.
///
/// Siblings never observe each other's writes. Once all of them finish,
/// their writes are merged at a single join and applied to the shared
/// context. Two siblings writing the same key is a configuration error,
/// detected up front for declared output keys and at the merge otherwise.
/// The first failure cancels the remaining siblings and nothing is merged.
///
/// The result carries the merged writes as its value; compose an aggregator
/// after it to produce a single reply.
pub struct ParallelComposer {
    name: String,
    description: String,
    children: Vec<WorkerRef>,
}

impl ParallelComposer {
    /// Creates a parallel composer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `children` is empty, has duplicate
    /// names, or two children declare the same output key.
    pub fn new(name: impl Into<String>, children: Vec<WorkerRef>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        validate_children(&name, &children)?;
        check_declared_collisions(&children)?;
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

    /// Returns the children.
    #[must_use]
    pub fn children(&self) -> &[WorkerRef] {
        &self.children
    }
}

fn check_declared_collisions(children: &[WorkerRef]) -> Result<(), ConfigurationError> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    for child in children {
        for key in child.declared_writes() {
            if let Some(owner) = owners.get(&key) {
                return Err(ConfigurationError::output_key_collision(
                    &key,
                    vec![(*owner).to_string(), child.name().to_string()],
                ));
            }
            owners.insert(key, child.name());
        }
    }
    Ok(())
}

impl fmt::Debug for ParallelComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelComposer")
            .field("name", &self.name)
            .field("children", &self.children)
            .finish()
    }
}

#[async_trait]
impl Worker for ParallelComposer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> WorkerKind {
        WorkerKind::Parallel
    }

    fn reads(&self) -> Vec<String> {
        let mut reads: Vec<String> = Vec::new();
        for key in self.children.iter().flat_map(|c| c.reads()) {
            if !reads.contains(&key) {
                reads.push(key);
            }
        }
        reads
    }

    fn declared_writes(&self) -> Vec<String> {
        union_writes(&self.children)
    }

    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
        let group = StructuredTaskGroup::new(ctx.cancel_token());

        for child in &self.children {
            let name = child.name().to_string();
            let child = child.clone();
            let parent = ctx.clone();
            group.spawn(&name, move |token| async move {
                let isolated = parent.fork_isolated(token);
                invoke(child.as_ref(), &isolated).await
            });
        }
        debug!(composer = %self.name, tasks = group.task_count(), "Parallel step started");

        let outputs = group.join().await?;

        let escalate = outputs.iter().any(|(_, output)| output.escalate);
        let merged = merge_isolated_writes(
            outputs
                .into_iter()
                .map(|(name, output)| (name, output.state_delta))
                .collect(),
        )?;
        ctx.state().apply(&merged);

        Ok(WorkerOutput {
            value: Some(Value::Object(merged.clone())),
            state_delta: merged,
            escalate,
            ..WorkerOutput::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigurationErrorKind;
    use crate::testing::{RecordingWorker, SlowWorker};
    use crate::workers::FnWorker;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn writer(name: &str, key: &'static str, value: Value, delay_ms: u64) -> WorkerRef {
        Arc::new(
            SlowWorker::new(name, Duration::from_millis(delay_ms)).with_write(key, value),
        )
    }

    #[tokio::test]
    async fn test_merge_is_union() {
        let parallel = ParallelComposer::new(
            "ParallelResearchTeam",
            vec![writer("WorkerA", "x", json!(1), 0), writer("WorkerB", "y", json!(2), 0)],
        )
        .unwrap();
        let ctx = WorkerContext::root("go");

        let output = invoke(&parallel, &ctx).await.unwrap();

        assert_eq!(Value::Object(ctx.state().to_map()), json!({"x": 1, "y": 2}));
        assert_eq!(output.value, Some(json!({"x": 1, "y": 2})));
        assert!(output.text.is_none());
    }

    #[tokio::test]
    async fn test_merge_independent_of_finish_order() {
        let fast_first = ParallelComposer::new(
            "p",
            vec![writer("A", "x", json!(1), 0), writer("B", "y", json!(2), 30)],
        )
        .unwrap();
        let slow_first = ParallelComposer::new(
            "p",
            vec![writer("A", "x", json!(1), 30), writer("B", "y", json!(2), 0)],
        )
        .unwrap();

        let a = invoke(&fast_first, &WorkerContext::root("go")).await.unwrap();
        let b = invoke(&slow_first, &WorkerContext::root("go")).await.unwrap();

        assert_eq!(a.state_delta, b.state_delta);
        assert_eq!(a.state_delta.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_siblings_are_isolated() {
        let a = Arc::new(RecordingWorker::new("A", "a").with_output_key("a_out"));
        let b = Arc::new(
            RecordingWorker::new("B", "b")
                .with_output_key("b_out")
                .with_delay(Duration::from_millis(20)),
        );
        let parallel = ParallelComposer::new("p", vec![a.clone(), b.clone()]).unwrap();
        let ctx = WorkerContext::root("go");
        ctx.state().set("topic", json!("ai"));

        invoke(&parallel, &ctx).await.unwrap();

        assert_eq!(b.seen()[0].keys(), vec!["topic"]);
        assert_eq!(a.seen()[0].keys(), vec!["topic"]);
        assert_eq!(ctx.get("a_out"), Some(json!("a")));
        assert_eq!(ctx.get("b_out"), Some(json!("b")));
    }

    #[test]
    fn test_declared_collision_rejected_at_construction() {
        let a: WorkerRef = Arc::new(FnWorker::new("WorkerA", |_| Ok(WorkerOutput::text("1"))).with_output_key("x"));
        let c: WorkerRef = Arc::new(FnWorker::new("WorkerC", |_| Ok(WorkerOutput::text("2"))).with_output_key("x"));

        let err = ParallelComposer::new("p", vec![a, c]).unwrap_err();
        assert_eq!(err.kind, ConfigurationErrorKind::OutputKeyCollision);
        assert_eq!(err.workers, vec!["WorkerA", "WorkerC"]);
    }

    #[tokio::test]
    async fn test_dynamic_collision_raised_at_merge() {
        let parallel = ParallelComposer::new(
            "p",
            vec![writer("WorkerA", "x", json!(1), 0), writer("WorkerC", "x", json!(2), 0)],
        )
        .unwrap();
        let ctx = WorkerContext::root("go");

        let err = invoke(&parallel, &ctx).await.unwrap_err();

        assert_eq!(
            err.configuration_kind(),
            Some(ConfigurationErrorKind::OutputKeyCollision)
        );
        assert!(ctx.get("x").is_none());
    }

    #[tokio::test]
    async fn test_failure_cancels_siblings_without_merge() {
        let slow = Arc::new(
            SlowWorker::new("slow", Duration::from_secs(10)).with_write("slow_key", json!(true)),
        );
        let fast = writer("fast", "fast_key", json!(1), 0);
        let broken: WorkerRef = Arc::new(FnWorker::new("broken", |_| {
            Err(AgentflowError::worker("broken", "boom"))
        }));
        let parallel = ParallelComposer::new("p", vec![slow.clone(), fast, broken]).unwrap();
        let ctx = WorkerContext::root("go");

        let started = std::time::Instant::now();
        let err = invoke(&parallel, &ctx).await.unwrap_err();

        assert!(matches!(err, AgentflowError::Worker { ref worker, .. } if worker == "broken"));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(ctx.state().is_empty());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_cancellation_reaches_siblings() {
        let slow_a: WorkerRef = Arc::new(SlowWorker::new("a", Duration::from_secs(10)));
        let slow_b: WorkerRef = Arc::new(SlowWorker::new("b", Duration::from_secs(10)));
        let parallel = ParallelComposer::new("p", vec![slow_a, slow_b]).unwrap();
        let ctx = WorkerContext::root("go");

        let token = ctx.cancel_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel("user abort");
        });

        let err = invoke(&parallel, &ctx).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(ctx.state().is_empty());
    }

    #[derive(Debug)]
    struct FlagWorker {
        finished: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl Worker for FlagWorker {
        fn name(&self) -> &str {
            "flag"
        }

        async fn run(&self, _ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.finished.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(WorkerOutput::text("late"))
        }
    }

    #[tokio::test]
    async fn test_dropped_step_stops_children() {
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag: WorkerRef = Arc::new(FlagWorker {
            finished: finished.clone(),
        });
        let parallel = ParallelComposer::new("p", vec![flag, writer("B", "y", json!(2), 0)]).unwrap();
        let ctx = WorkerContext::root("go");

        let result = tokio::time::timeout(Duration::from_millis(20), invoke(&parallel, &ctx)).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!finished.load(std::sync::atomic::Ordering::SeqCst));
        assert!(ctx.state().is_empty());
    }
}
