//! Single tool invocation with timing and failure capture

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;

use super::registry::ToolRegistry;
use super::ToolError;
use crate::domain::{ErrorKind, Parameters, ToolCall, ToolExecutionResult};

/// Check arguments against the `required` list and declared primitive types
pub fn validate_arguments(schema: &Value, parameters: &Parameters) -> Result<(), String> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !parameters.contains_key(field) {
                return Err(format!("missing required field: {}", field));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, value) in parameters {
            let Some(expected) = properties
                .get(name)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if !matches_type(expected, value) {
                return Err(format!("field '{}' should be of type {}", name, expected));
            }
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Executes one call against the registry; never fails, always returns a result
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, tool_timeout: Duration) -> Self {
        Self { registry, tool_timeout }
    }

    pub async fn invoke(&self, call: &ToolCall) -> ToolExecutionResult {
        let started = Instant::now();
        let result = self.invoke_inner(call, started).await;

        tracing::info!(
            tool = %result.tool_name,
            status = ?result.status,
            elapsed_ms = result.execution_time_ms,
            "Tool invocation finished"
        );
        result
    }

    async fn invoke_inner(&self, call: &ToolCall, started: Instant) -> ToolExecutionResult {
        let elapsed = || started.elapsed().as_millis() as u64;

        let Some(tool) = self.registry.lookup(call.tool_name()) else {
            return ToolExecutionResult::failure(
                call,
                ErrorKind::NotFound,
                format!("Unknown tool: {}", call.tool_name()),
                elapsed(),
            );
        };

        if let Err(detail) = validate_arguments(&tool.parameters_schema(), call.parameters()) {
            return ToolExecutionResult::failure(call, ErrorKind::InvalidArguments, detail, elapsed());
        }

        let run = AssertUnwindSafe(tool.invoke(call.parameters().clone())).catch_unwind();
        match tokio::time::timeout(self.tool_timeout, run).await {
            Err(_) => ToolExecutionResult::failure(
                call,
                ErrorKind::Timeout,
                format!("Timed out after {}ms", self.tool_timeout.as_millis()),
                elapsed(),
            ),
            Ok(Err(payload)) => ToolExecutionResult::failure(
                call,
                ErrorKind::Panicked,
                format!("Tool panicked: {}", panic_message(payload.as_ref())),
                elapsed(),
            ),
            Ok(Ok(Err(ToolError::InvalidArguments(detail)))) => {
                ToolExecutionResult::failure(call, ErrorKind::InvalidArguments, detail, elapsed())
            }
            Ok(Ok(Err(ToolError::Failed(detail)))) => {
                ToolExecutionResult::failure(call, ErrorKind::ExecutionFailed, detail, elapsed())
            }
            Ok(Ok(Ok(value))) => ToolExecutionResult::success(call, value, elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoTool, Tool};
    use async_trait::async_trait;
    use serde_json::json;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Sleeps longer than any sane timeout"
        }

        async fn invoke(&self, _parameters: Parameters) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    struct PanickyTool;

    #[async_trait]
    impl Tool for PanickyTool {
        fn name(&self) -> &str {
            "panicky"
        }

        fn description(&self) -> &str {
            "Always panics"
        }

        async fn invoke(&self, _parameters: Parameters) -> Result<Value, ToolError> {
            panic!("boom")
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "Always reports failure"
        }

        async fn invoke(&self, _parameters: Parameters) -> Result<Value, ToolError> {
            Err(ToolError::failed("service unavailable"))
        }
    }

    fn invoker() -> ToolInvoker {
        let registry = ToolRegistry::new()
            .with_tool(EchoTool)
            .unwrap()
            .with_tool(SlowTool)
            .unwrap()
            .with_tool(PanickyTool)
            .unwrap()
            .with_tool(FailingTool)
            .unwrap();
        ToolInvoker::new(Arc::new(registry), Duration::from_millis(50))
    }

    #[test]
    fn test_validate_arguments_required() {
        let schema = json!({"type": "object", "required": ["city"]});
        let params = Parameters::new();
        assert_eq!(
            validate_arguments(&schema, &params),
            Err("missing required field: city".to_string())
        );
    }

    #[test]
    fn test_validate_arguments_types() {
        let schema = json!({
            "type": "object",
            "properties": {
                "count": {"type": "integer"},
                "label": {"type": "string"},
                "extra": {"description": "untyped"}
            }
        });
        let good = json!({"count": 3, "label": "x", "extra": [1]});
        let bad = json!({"count": 1.5});
        assert!(validate_arguments(&schema, good.as_object().unwrap()).is_ok());
        assert_eq!(
            validate_arguments(&schema, bad.as_object().unwrap()),
            Err("field 'count' should be of type integer".to_string())
        );
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let call = ToolCall::from_json("echo", json!({"text": "hi"}));
        let result = invoker().invoke(&call).await;
        assert!(result.is_success());
        assert_eq!(result.result, Some(json!("hi")));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let call = ToolCall::from_json("missing", json!({}));
        let result = invoker().invoke(&call).await;
        assert_eq!(result.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(result.error_detail.as_deref(), Some("Unknown tool: missing"));
    }

    #[tokio::test]
    async fn test_invoke_rejects_missing_argument() {
        let call = ToolCall::from_json("echo", json!({}));
        let result = invoker().invoke(&call).await;
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidArguments));
    }

    #[tokio::test]
    async fn test_invoke_timeout() {
        let call = ToolCall::from_json("slow", json!({}));
        let result = invoker().invoke(&call).await;
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_invoke_captures_panic() {
        let call = ToolCall::from_json("panicky", json!({}));
        let result = invoker().invoke(&call).await;
        assert_eq!(result.error_kind, Some(ErrorKind::Panicked));
        assert_eq!(result.error_detail.as_deref(), Some("Tool panicked: boom"));
    }

    #[tokio::test]
    async fn test_invoke_reported_failure() {
        let call = ToolCall::from_json("failing", json!({}));
        let result = invoker().invoke(&call).await;
        assert_eq!(result.error_kind, Some(ErrorKind::ExecutionFailed));
        assert_eq!(result.error_detail.as_deref(), Some("service unavailable"));
    }
}
