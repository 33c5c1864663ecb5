//! Delegating workers: control flow chosen at run time by a decider.

use super::{invoke, Worker, WorkerRef};
use crate::context::{render_instruction, template_keys, WorkerContext};
use crate::core::{WorkerKind, WorkerOutput};
use crate::decision::{
    with_retry, Decider, DecisionRequest, RetryOptions, StepRecord, ToolCall, WorkerSpec,
};
use crate::errors::{AgentflowError, ConfigurationError, DecisionFailure};
use crate::events::LifecycleEvent;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A worker whose next action is chosen by a [`Decider`].
///
/// Each round the decider sees the rendered instruction, the request, a
/// context snapshot, the sub-worker catalogue and the records of calls made
/// so far. It answers with a final reply or with tool calls, which are
/// invoked in order against the shared context. A sub-worker raising the
/// exit signal ends the step loop after the current batch.
pub struct DelegatingWorker {
    name: String,
    description: String,
    instruction: String,
    decider: Arc<dyn Decider>,
    sub_workers: Vec<WorkerRef>,
    output_key: Option<String>,
    max_steps: Option<usize>,
    retry: Option<RetryOptions>,
}

impl DelegatingWorker {
    /// Creates a delegating worker with no sub-workers.
    pub fn new(name: impl Into<String>, decider: Arc<dyn Decider>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            decider,
            sub_workers: Vec::new(),
            output_key: None,
            max_steps: None,
            retry: None,
        }
    }

    /// Sets the description shown to a parent decider.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the instruction template.
    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Adds a callable sub-worker.
    #[must_use]
    pub fn with_sub_worker(mut self, worker: WorkerRef) -> Self {
        self.sub_workers.push(worker);
        self
    }

    /// Adds several callable sub-workers.
    #[must_use]
    pub fn with_sub_workers(mut self, workers: Vec<WorkerRef>) -> Self {
        self.sub_workers.extend(workers);
        self
    }

    /// Sets the output key.
    #[must_use]
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Bounds the number of decision rounds.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Overrides the run's retry options for this worker's decisions.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Returns the instruction template.
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Returns the sub-worker catalogue.
    pub fn catalogue(&self) -> Result<Vec<WorkerSpec>, ConfigurationError> {
        let mut seen = HashSet::new();
        self.sub_workers
            .iter()
            .map(|worker| {
                if !seen.insert(worker.name()) {
                    return Err(ConfigurationError::duplicate_worker_name(
                        &self.name,
                        worker.name(),
                    ));
                }
                Ok(WorkerSpec {
                    name: worker.name().to_string(),
                    description: worker.description().to_string(),
                    kind: worker.kind(),
                })
            })
            .collect()
    }

    fn sub_worker(&self, name: &str) -> Option<&WorkerRef> {
        self.sub_workers.iter().find(|w| w.name() == name)
    }

    async fn decide(
        &self,
        request: &DecisionRequest,
        retry: &RetryOptions,
    ) -> Result<crate::decision::Decision, DecisionFailure> {
        with_retry(
            retry,
            &self.name,
            |failure: &DecisionFailure| failure.is_retryable(&retry.http_status_codes),
            || self.decider.decide(request),
        )
        .await
    }

    async fn dispatch(
        &self,
        ctx: &WorkerContext,
        call: ToolCall,
        step: usize,
        output: &mut WorkerOutput,
    ) -> Result<StepRecord, AgentflowError> {
        let Some(target) = self.sub_worker(&call.name) else {
            warn!(worker = %self.name, target = %call.name, "Decision named an unknown worker");
            let result = json!({
                "status": "error",
                "error_message": format!("unknown worker '{}'", call.name),
            });
            return Ok(StepRecord {
                call,
                result,
                is_error: true,
            });
        };

        ctx.emit(LifecycleEvent::delegation(&self.name, &call.name, step));
        let sub_request = call
            .args
            .get("request")
            .and_then(Value::as_str)
            .map_or_else(|| ctx.request().to_string(), str::to_string);
        let sub_ctx = ctx.with_input(sub_request, call.args.clone());

        let child = invoke(target.as_ref(), &sub_ctx).await?;
        let result = child.primary().unwrap_or(Value::Null);
        output.state_delta.extend(child.state_delta);
        output.escalate |= child.escalate;

        Ok(StepRecord {
            call,
            result,
            is_error: false,
        })
    }
}

impl fmt::Debug for DelegatingWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sub_workers.iter().map(|w| w.name()).collect();
        f.debug_struct("DelegatingWorker")
            .field("name", &self.name)
            .field("sub_workers", &names)
            .field("output_key", &self.output_key)
            .field("max_steps", &self.max_steps)
            .finish()
    }
}

#[async_trait]
impl Worker for DelegatingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> WorkerKind {
        WorkerKind::Delegating
    }

    fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    fn reads(&self) -> Vec<String> {
        template_keys(&self.instruction)
    }

    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
        let available = self.catalogue()?;
        let max_steps = self.max_steps.unwrap_or(ctx.config().max_delegation_steps);
        let retry = self.retry.clone().unwrap_or_else(|| ctx.config().retry.clone());

        let mut output = WorkerOutput::empty();
        let mut steps: Vec<StepRecord> = Vec::new();

        for step in 0..max_steps {
            let context = ctx.snapshot();
            let request = DecisionRequest {
                worker: self.name.clone(),
                instruction: render_instruction(&self.name, &self.instruction, &context)?,
                request: ctx.request().to_string(),
                context,
                available: available.clone(),
                steps: steps.clone(),
                history: ctx.run().history().to_vec(),
            };

            let decision = self.decide(&request, &retry).await?;
            debug!(
                worker = %self.name,
                step,
                calls = decision.tool_calls.len(),
                "Decision received"
            );

            if !decision.outputs.is_empty() {
                ctx.state().apply(&decision.outputs);
                output.state_delta.extend(decision.outputs);
            }

            if decision.tool_calls.is_empty() {
                output.text = decision.text;
                return Ok(output);
            }

            for call in decision.tool_calls {
                let record = self.dispatch(ctx, call, step, &mut output).await?;
                steps.push(record);
            }

            if output.escalate {
                output.text = decision.text;
                return Ok(output);
            }
        }

        Err(DecisionFailure::step_limit(&self.name, max_steps).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Decision;
    use crate::errors::ConfigurationErrorKind;
    use crate::testing::{FailingDecider, ScriptedDecider};
    use crate::workers::{FnWorker, FunctionWorker, ToolResult};
    use serde_json::json;

    fn research_agent() -> WorkerRef {
        Arc::new(
            FnWorker::new("ResearchAgent", |ctx| {
                Ok(WorkerOutput::text(format!("findings on {}", ctx.request())))
            })
            .with_description("Searches for information")
            .with_output_key("research_findings"),
        )
    }

    fn summarizer_agent() -> WorkerRef {
        Arc::new(
            FnWorker::new("SummarizerAgent", |ctx| {
                let findings = ctx
                    .get("research_findings")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                Ok(WorkerOutput::text(format!("summary of {findings}")))
            })
            .with_output_key("final_summary"),
        )
    }

    fn fast_retry() -> RetryOptions {
        RetryOptions::new().with_attempts(3).with_initial_delay_ms(1)
    }

    #[tokio::test]
    async fn test_coordinator_calls_sub_workers_in_order() {
        let decider = Arc::new(ScriptedDecider::new(vec![
            Decision::call(ToolCall::request("ResearchAgent", "quantum computing")),
            Decision::call(ToolCall::request("SummarizerAgent", "summarize")),
            Decision::reply("Here is your summary"),
        ]));
        let coordinator = DelegatingWorker::new("ResearchCoordinator", decider.clone())
            .with_sub_workers(vec![research_agent(), summarizer_agent()]);

        let ctx = WorkerContext::root("What's new in quantum computing?");
        let output = invoke(&coordinator, &ctx).await.unwrap();

        assert_eq!(output.text.as_deref(), Some("Here is your summary"));
        assert_eq!(
            ctx.get("final_summary"),
            Some(json!("summary of findings on quantum computing"))
        );

        let requests = decider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].available.len(), 2);
        assert!(requests[0].steps.is_empty());
        assert_eq!(requests[2].steps.len(), 2);
        assert_eq!(requests[2].steps[1].result, json!("summary of findings on quantum computing"));
        assert!(requests[1].context.contains_key("research_findings"));
    }

    #[tokio::test]
    async fn test_tool_error_status_reaches_decider() {
        let fee = Arc::new(FunctionWorker::new("get_fee_for_payment_method", |_ctx, _args| {
            Ok(ToolResult::error("Payment method 'paypal' not found"))
        }));
        let decider = Arc::new(ScriptedDecider::new(vec![
            Decision::call(ToolCall::new("get_fee_for_payment_method", json!({"method": "paypal"}))),
            Decision::reply("Sorry, that payment method is not supported."),
        ]));
        let agent = DelegatingWorker::new("currency_agent", decider.clone()).with_sub_worker(fee);

        let output = invoke(&agent, &WorkerContext::root("convert 500 USD")).await.unwrap();

        assert!(output.text.unwrap().contains("not supported"));
        assert_eq!(decider.requests()[1].steps[0].result["status"], "error");
        assert!(!decider.requests()[1].steps[0].is_error);
    }

    #[tokio::test]
    async fn test_unknown_worker_is_recorded_not_raised() {
        let decider = Arc::new(ScriptedDecider::new(vec![
            Decision::call(ToolCall::request("NoSuchAgent", "x")),
            Decision::reply("recovered"),
        ]));
        let agent = DelegatingWorker::new("root", decider.clone()).with_sub_worker(research_agent());

        let output = invoke(&agent, &WorkerContext::root("hi")).await.unwrap();

        assert_eq!(output.text.as_deref(), Some("recovered"));
        let step = &decider.requests()[1].steps[0];
        assert!(step.is_error);
        assert_eq!(step.result["status"], "error");
    }

    #[tokio::test]
    async fn test_step_limit_is_decision_failure() {
        let decider = Arc::new(ScriptedDecider::repeating(Decision::call(ToolCall::request(
            "ResearchAgent",
            "again",
        ))));
        let agent = DelegatingWorker::new("root", decider)
            .with_sub_worker(research_agent())
            .with_max_steps(3);

        let err = invoke(&agent, &WorkerContext::root("hi")).await.unwrap_err();
        assert!(matches!(err, AgentflowError::Decision(_)));
    }

    #[tokio::test]
    async fn test_retryable_failures_are_retried() {
        let decider = Arc::new(ScriptedDecider::from_results(vec![
            Err(DecisionFailure::new("root", "rate limited").with_status(429)),
            Err(DecisionFailure::timeout("root")),
            Ok(Decision::reply("third time lucky")),
        ]));
        let agent = DelegatingWorker::new("root", decider.clone()).with_retry(fast_retry());

        let output = invoke(&agent, &WorkerContext::root("hi")).await.unwrap();
        assert_eq!(output.text.as_deref(), Some("third time lucky"));
        assert_eq!(decider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_surfaces() {
        let decider = Arc::new(FailingDecider::new(
            DecisionFailure::new("root", "bad request").with_status(400),
        ));
        let agent = DelegatingWorker::new("root", decider.clone()).with_retry(fast_retry());

        let err = invoke(&agent, &WorkerContext::root("hi")).await.unwrap_err();
        assert!(matches!(err, AgentflowError::Decision(ref f) if f.status_code == Some(400)));
        assert_eq!(decider.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhaust() {
        let decider = Arc::new(FailingDecider::new(
            DecisionFailure::new("root", "unavailable").with_status(503),
        ));
        let agent = DelegatingWorker::new("root", decider.clone()).with_retry(fast_retry());

        assert!(invoke(&agent, &WorkerContext::root("hi")).await.is_err());
        assert_eq!(decider.calls(), 3);
    }

    #[tokio::test]
    async fn test_instruction_rendered_and_missing_key_rejected() {
        let decider = Arc::new(ScriptedDecider::new(vec![Decision::reply("ok")]));
        let agent = DelegatingWorker::new("Writer", decider.clone())
            .with_instruction("Follow this outline: {blog_outline}");

        let ctx = WorkerContext::root("write");
        ctx.state().set("blog_outline", json!("1. Intro"));
        invoke(&agent, &ctx).await.unwrap();
        assert_eq!(decider.requests()[0].instruction, "Follow this outline: 1. Intro");
        assert_eq!(agent.reads(), vec!["blog_outline"]);

        let err = invoke(&agent, &WorkerContext::root("write")).await.unwrap_err();
        assert_eq!(
            err.configuration_kind(),
            Some(ConfigurationErrorKind::MissingContextKey)
        );
    }

    #[tokio::test]
    async fn test_decision_outputs_written_to_context() {
        let decider = Arc::new(ScriptedDecider::new(vec![
            Decision::reply("done").with_output("topic", json!("quantum")),
        ]));
        let agent = DelegatingWorker::new("root", decider).with_output_key("answer");

        let ctx = WorkerContext::root("hi");
        let output = invoke(&agent, &ctx).await.unwrap();

        assert_eq!(ctx.get("topic"), Some(json!("quantum")));
        assert_eq!(ctx.get("answer"), Some(json!("done")));
        assert_eq!(output.state_delta.len(), 2);
    }

    #[tokio::test]
    async fn test_sub_worker_escalation_ends_step_loop() {
        let exit_loop = Arc::new(FunctionWorker::new("exit_loop", |tool_ctx, _args| {
            tool_ctx.escalate();
            Ok(ToolResult::success())
        }));
        let decider = Arc::new(ScriptedDecider::new(vec![Decision {
            text: Some("APPROVED".to_string()),
            ..Decision::call(ToolCall::new("exit_loop", json!({})))
        }]));
        let critic = DelegatingWorker::new("Critic", decider.clone()).with_sub_worker(exit_loop);

        let output = invoke(&critic, &WorkerContext::root("review")).await.unwrap();

        assert!(output.escalate);
        assert_eq!(output.text.as_deref(), Some("APPROVED"));
        assert_eq!(decider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sub_worker_names_rejected() {
        let decider = Arc::new(ScriptedDecider::new(vec![Decision::reply("ok")]));
        let agent = DelegatingWorker::new("root", decider)
            .with_sub_workers(vec![research_agent(), research_agent()]);

        let err = invoke(&agent, &WorkerContext::root("hi")).await.unwrap_err();
        assert_eq!(
            err.configuration_kind(),
            Some(ConfigurationErrorKind::DuplicateWorkerName)
        );
    }
}
