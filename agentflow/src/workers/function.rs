//! Function workers: deterministic tools with structured results.
//!
//! A function returns a [`ToolResult`] tagged `success` or `error`. An error
//! status is ordinary data: it lands in the context like any other result so
//! a delegating worker can react to it. Only malformed input (non-object
//! arguments, a missing required parameter, a wrongly typed value) or a
//! [`ToolInvocationError`] returned by the function aborts the run.

use super::Worker;
use crate::context::{ContextSnapshot, WorkerContext};
use crate::core::{WorkerKind, WorkerOutput};
use crate::errors::{AgentflowError, ToolInvocationError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome tag of a tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// The tool did its job.
    Success,
    /// The tool could not do its job; see `error_message`.
    Error,
}

/// A structured tool result, serialized as `{"status": ..., ...data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Success or error.
    pub status: ToolStatus,

    /// Result fields, flattened into the top-level object.
    #[serde(flatten)]
    pub data: Map<String, Value>,

    /// Human-readable reason, for error results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolResult {
    /// A successful result with no fields.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: ToolStatus::Success,
            data: Map::new(),
            error_message: None,
        }
    }

    /// An error result with a reason.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            data: Map::new(),
            error_message: Some(message.into()),
        }
    }

    /// Adds a result field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns true for a success result.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// Converts to JSON.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("status".to_string(), serde_json::json!(self.status));
        for (key, value) in &self.data {
            object.insert(key.clone(), value.clone());
        }
        if let Some(message) = &self.error_message {
            object.insert("error_message".to_string(), Value::String(message.clone()));
        }
        Value::Object(object)
    }
}

/// Expected JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    /// A JSON string.
    String,
    /// A JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
    /// Anything.
    #[default]
    Any,
}

impl ParameterType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }
}

/// A declared tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// The argument name.
    pub name: String,
    /// What the argument means.
    #[serde(default)]
    pub description: String,
    /// The expected JSON type.
    #[serde(default, rename = "type")]
    pub param_type: ParameterType,
    /// Whether the argument must be present.
    #[serde(default)]
    pub required: bool,
}

impl ParameterSpec {
    /// A required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            param_type,
            required: true,
        }
    }

    /// An optional parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type)
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// What a tool function sees besides its arguments.
///
/// Writes are buffered and become the worker's output delta; reads see the
/// buffered writes first, then the context as it was when the tool started.
#[derive(Debug)]
pub struct ToolContext {
    tool: String,
    snapshot: ContextSnapshot,
    writes: Mutex<Map<String, Value>>,
    escalate: AtomicBool,
}

impl ToolContext {
    /// Creates a tool context over a snapshot.
    #[must_use]
    pub fn new(tool: impl Into<String>, snapshot: ContextSnapshot) -> Self {
        Self {
            tool: tool.into(),
            snapshot,
            writes: Mutex::new(Map::new()),
            escalate: AtomicBool::new(false),
        }
    }

    /// Returns the tool's name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool
    }

    /// Reads a context value.
    #[must_use]
    pub fn state(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.writes.lock().get(key) {
            return Some(value.clone());
        }
        self.snapshot.get(key).cloned()
    }

    /// Buffers a context write.
    pub fn set_state(&self, key: impl Into<String>, value: Value) {
        self.writes.lock().insert(key.into(), value);
    }

    /// Raises the loop exit signal.
    pub fn escalate(&self) {
        self.escalate.store(true, Ordering::SeqCst);
    }

    /// Returns true if the exit signal was raised.
    #[must_use]
    pub fn escalated(&self) -> bool {
        self.escalate.load(Ordering::SeqCst)
    }

    fn into_parts(self) -> (Map<String, Value>, bool) {
        (self.writes.into_inner(), self.escalate.into_inner())
    }
}

type ToolFn =
    dyn Fn(&ToolContext, &Map<String, Value>) -> Result<ToolResult, ToolInvocationError> + Send + Sync;

/// A worker that wraps a deterministic function.
#[derive(Clone)]
pub struct FunctionWorker {
    name: String,
    description: String,
    parameters: Vec<ParameterSpec>,
    output_key: Option<String>,
    func: Arc<ToolFn>,
}

impl FunctionWorker {
    /// Creates a function worker.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ToolContext, &Map<String, Value>) -> Result<ToolResult, ToolInvocationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            output_key: None,
            func: Arc::new(func),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Sets the output key.
    #[must_use]
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Validates arguments against the declared parameters.
    ///
    /// `Null` is treated as no arguments.
    pub fn validate_args(&self, args: &Value) -> Result<Map<String, Value>, ToolInvocationError> {
        let args = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ToolInvocationError::malformed(
                    &self.name,
                    format!("arguments must be an object, got {other}"),
                ))
            }
        };

        for parameter in &self.parameters {
            match args.get(&parameter.name) {
                None | Some(Value::Null) if parameter.required => {
                    return Err(ToolInvocationError::missing_argument(&self.name, &parameter.name));
                }
                Some(value) if !value.is_null() && !parameter.param_type.accepts(value) => {
                    return Err(ToolInvocationError::malformed(
                        &self.name,
                        format!(
                            "argument '{}' must be of type {:?}",
                            parameter.name, parameter.param_type
                        ),
                    ));
                }
                _ => {}
            }
        }

        Ok(args)
    }

    /// Calls the function directly, outside a run.
    pub fn call(
        &self,
        ctx: &ToolContext,
        args: &Value,
    ) -> Result<ToolResult, ToolInvocationError> {
        let args = self.validate_args(args)?;
        (self.func)(ctx, &args)
    }
}

impl fmt::Debug for FunctionWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionWorker")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("output_key", &self.output_key)
            .finish()
    }
}

#[async_trait]
impl Worker for FunctionWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> WorkerKind {
        WorkerKind::Function
    }

    fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutput, AgentflowError> {
        let tool_ctx = ToolContext::new(&self.name, ctx.snapshot());
        let result = self.call(&tool_ctx, ctx.args())?;

        let value = result.to_value();
        let (writes, escalate) = tool_ctx.into_parts();

        Ok(WorkerOutput {
            text: Some(value.to_string()),
            value: Some(value),
            state_delta: writes,
            escalate,
            ..WorkerOutput::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::invoke;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fee_lookup() -> FunctionWorker {
        FunctionWorker::new("get_fee_for_payment_method", |_ctx, args| {
            let method = args
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            let fee = match method.as_str() {
                "platinum credit card" => 0.02,
                "gold debit card" => 0.035,
                "bank transfer" => 0.01,
                _ => {
                    return Ok(ToolResult::error(format!(
                        "Payment method '{method}' not found"
                    )))
                }
            };
            Ok(ToolResult::success().with("fee_percentage", json!(fee)))
        })
        .with_parameter(ParameterSpec::required("method", ParameterType::String))
        .with_output_key("fee")
    }

    #[test]
    fn test_tool_result_serialization() {
        let result = ToolResult::success().with("rate", json!(83.58));
        assert_eq!(result.to_value(), json!({"status": "success", "rate": 83.58}));
        assert_eq!(serde_json::to_value(&result).unwrap(), result.to_value());

        let error = ToolResult::error("Unsupported currency pair");
        assert_eq!(
            error.to_value(),
            json!({"status": "error", "error_message": "Unsupported currency pair"})
        );
    }

    #[test]
    fn test_tool_result_deserialization() {
        let result: ToolResult =
            serde_json::from_value(json!({"status": "success", "rate": 0.93})).unwrap();
        assert!(result.is_success());
        assert_eq!(result.data["rate"], json!(0.93));
    }

    #[tokio::test]
    async fn test_success_result_written_to_context() {
        let ctx = WorkerContext::root("fee?").with_input("", json!({"method": "Platinum Credit Card"}));
        let output = invoke(&fee_lookup(), &ctx).await.unwrap();

        assert_eq!(output.value, Some(json!({"status": "success", "fee_percentage": 0.02})));
        assert_eq!(ctx.get("fee"), Some(json!({"status": "success", "fee_percentage": 0.02})));
    }

    #[tokio::test]
    async fn test_error_status_is_data() {
        let ctx = WorkerContext::root("fee?").with_input("", json!({"method": "paypal"}));
        let output = invoke(&fee_lookup(), &ctx).await.unwrap();

        let value = output.value.unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(ctx.get("fee").unwrap()["status"], "error");
    }

    #[tokio::test]
    async fn test_missing_argument_raises() {
        let ctx = WorkerContext::root("fee?").with_input("", json!({}));
        let err = invoke(&fee_lookup(), &ctx).await.unwrap_err();

        assert!(matches!(
            err,
            AgentflowError::Tool(ToolInvocationError::MissingArgument { ref argument, .. }) if argument == "method"
        ));
        assert!(ctx.get("fee").is_none());
    }

    #[tokio::test]
    async fn test_non_object_arguments_raise() {
        let ctx = WorkerContext::root("").with_input("", json!("platinum"));
        let err = invoke(&fee_lookup(), &ctx).await.unwrap_err();
        assert!(matches!(err, AgentflowError::Tool(ToolInvocationError::MalformedArguments { .. })));
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let err = fee_lookup().validate_args(&json!({"method": 42})).unwrap_err();
        assert!(matches!(err, ToolInvocationError::MalformedArguments { .. }));
    }

    #[tokio::test]
    async fn test_tool_context_writes_and_escalate() {
        let save_name = FunctionWorker::new("save_userinfo", |tool_ctx, args| {
            tool_ctx.set_state("user:name", args["name"].clone());
            tool_ctx.set_state("user:country", args["country"].clone());
            Ok(ToolResult::success())
        })
        .with_parameter(ParameterSpec::required("name", ParameterType::String))
        .with_parameter(ParameterSpec::required("country", ParameterType::String));

        let ctx = WorkerContext::root("").with_input("", json!({"name": "Sam", "country": "Poland"}));
        let output = invoke(&save_name, &ctx).await.unwrap();

        assert_eq!(ctx.get("user:name"), Some(json!("Sam")));
        assert_eq!(output.state_delta.len(), 2);
        assert!(!output.escalate);

        let exit_loop = FunctionWorker::new("exit_loop", |tool_ctx, _args| {
            tool_ctx.escalate();
            Ok(ToolResult::success())
        });
        let output = invoke(&exit_loop, &WorkerContext::root("")).await.unwrap();
        assert!(output.escalate);
    }

    #[test]
    fn test_tool_context_reads_pending_writes_first() {
        let mut map = Map::new();
        map.insert("user:name".to_string(), json!("Old"));
        let tool_ctx = ToolContext::new("t", ContextSnapshot::from_map(map));

        assert_eq!(tool_ctx.state("user:name"), Some(json!("Old")));
        tool_ctx.set_state("user:name", json!("New"));
        assert_eq!(tool_ctx.state("user:name"), Some(json!("New")));
    }
}
