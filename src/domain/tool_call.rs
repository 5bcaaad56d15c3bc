//! Tool calls and their execution results
//!
//! A ToolCall is issued by the reasoner (or by recovery) and is immutable once
//! built. Every dispatched call yields exactly one ToolExecutionResult.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named arguments for a tool call
pub type Parameters = Map<String, Value>;

/// One requested tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    tool_name: String,
    #[serde(default)]
    parameters: Parameters,
    #[serde(default)]
    rationale: String,
}

impl ToolCall {
    /// Create a call with the given arguments
    pub fn new(tool_name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
            rationale: String::new(),
        }
    }

    /// Create a call from a JSON object literal; non-object values yield no arguments
    pub fn from_json(tool_name: impl Into<String>, parameters: Value) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Parameters::new(),
        };
        Self::new(tool_name, parameters)
    }

    /// Attach the reason this call was requested
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }
}

/// Outcome of one dispatched call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
    Skipped,
}

/// Why a call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Tool name not present in the registry
    NotFound,
    /// Arguments rejected before or during invocation
    InvalidArguments,
    /// Tool ran and reported failure
    ExecutionFailed,
    /// Per-call timeout elapsed
    Timeout,
    /// Tool panicked
    Panicked,
    /// Parallel batch deadline elapsed before the call finished
    BatchTimeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArguments => "invalid_arguments",
            Self::ExecutionFailed => "execution_failed",
            Self::Timeout => "timeout",
            Self::Panicked => "panicked",
            Self::BatchTimeout => "batch_timeout",
        }
    }
}

/// Structured result of one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub tool_name: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub parameters: Parameters,
}

impl ToolExecutionResult {
    /// Successful call; a null value is stored as no result
    pub fn success(call: &ToolCall, value: Value, execution_time_ms: u64) -> Self {
        Self {
            tool_name: call.tool_name.clone(),
            status: ToolStatus::Success,
            result: if value.is_null() { None } else { Some(value) },
            error_detail: None,
            error_kind: None,
            skip_reason: None,
            execution_time_ms,
            parameters: call.parameters.clone(),
        }
    }

    /// Failed call
    pub fn failure(call: &ToolCall, kind: ErrorKind, detail: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            tool_name: call.tool_name.clone(),
            status: ToolStatus::Error,
            result: None,
            error_detail: Some(detail.into()),
            error_kind: Some(kind),
            skip_reason: None,
            execution_time_ms,
            parameters: call.parameters.clone(),
        }
    }

    /// Call that was never dispatched
    pub fn skipped(call: &ToolCall, reason: impl Into<String>) -> Self {
        Self {
            tool_name: call.tool_name.clone(),
            status: ToolStatus::Skipped,
            result: None,
            error_detail: None,
            error_kind: None,
            skip_reason: Some(reason.into()),
            execution_time_ms: 0,
            parameters: call.parameters.clone(),
        }
    }

    /// Turn a failure into a skipped entry, keeping the failure detail in the reason
    pub fn into_skipped(self, reason: impl Into<String>) -> Self {
        let reason = match &self.error_detail {
            Some(detail) => format!("{} (was: {})", reason.into(), detail),
            None => reason.into(),
        };
        Self {
            status: ToolStatus::Skipped,
            skip_reason: Some(reason),
            ..self
        }
    }

    /// Rebuild the call that produced this result
    pub fn to_call(&self) -> ToolCall {
        ToolCall::new(self.tool_name.clone(), self.parameters.clone())
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }

    pub fn is_skipped(&self) -> bool {
        self.status == ToolStatus::Skipped
    }

    /// One-line digest used in history entries
    pub fn brief(&self) -> String {
        match self.status {
            ToolStatus::Success => format!("{}: ok", self.tool_name),
            ToolStatus::Error => format!(
                "{}: error ({})",
                self.tool_name,
                self.error_detail.as_deref().unwrap_or("unknown error")
            ),
            ToolStatus::Skipped => format!(
                "{}: skipped ({})",
                self.tool_name,
                self.skip_reason.as_deref().unwrap_or("no reason")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_call() -> ToolCall {
        ToolCall::from_json("lookup_weather", json!({"city": "Paris"})).with_rationale("need the forecast")
    }

    #[test]
    fn test_tool_call_accessors() {
        let call = weather_call();
        assert_eq!(call.tool_name(), "lookup_weather");
        assert_eq!(call.parameters()["city"], "Paris");
        assert_eq!(call.rationale(), "need the forecast");
    }

    #[test]
    fn test_from_json_non_object_has_no_arguments() {
        let call = ToolCall::from_json("echo", json!("text"));
        assert!(call.parameters().is_empty());
    }

    #[test]
    fn test_tool_call_deserializes_without_optional_fields() {
        let call: ToolCall = serde_json::from_str(r#"{"tool_name": "current_time"}"#).unwrap();
        assert_eq!(call.tool_name(), "current_time");
        assert!(call.parameters().is_empty());
        assert_eq!(call.rationale(), "");
    }

    #[test]
    fn test_success_result() {
        let result = ToolExecutionResult::success(&weather_call(), json!({"temp": 21}), 12);
        assert!(result.is_success());
        assert_eq!(result.result, Some(json!({"temp": 21})));
        assert_eq!(result.parameters["city"], "Paris");
        assert_eq!(result.brief(), "lookup_weather: ok");
    }

    #[test]
    fn test_success_with_null_value_has_no_result() {
        let result = ToolExecutionResult::success(&weather_call(), Value::Null, 1);
        assert_eq!(result.result, None);
    }

    #[test]
    fn test_failure_result() {
        let result = ToolExecutionResult::failure(&weather_call(), ErrorKind::ExecutionFailed, "service unavailable", 50);
        assert!(result.is_error());
        assert_eq!(result.error_kind, Some(ErrorKind::ExecutionFailed));
        assert_eq!(result.brief(), "lookup_weather: error (service unavailable)");
    }

    #[test]
    fn test_into_skipped_keeps_detail() {
        let result = ToolExecutionResult::failure(&weather_call(), ErrorKind::Timeout, "took too long", 10)
            .into_skipped("recovery chose to skip");
        assert!(result.is_skipped());
        assert_eq!(
            result.skip_reason.as_deref(),
            Some("recovery chose to skip (was: took too long)")
        );
    }

    #[test]
    fn test_to_call_round_trips_name_and_parameters() {
        let result = ToolExecutionResult::failure(&weather_call(), ErrorKind::Timeout, "slow", 10);
        let call = result.to_call();
        assert_eq!(call.tool_name(), "lookup_weather");
        assert_eq!(call.parameters()["city"], "Paris");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&ToolStatus::Skipped).unwrap(), "\"skipped\"");
        assert_eq!(serde_json::to_string(&ErrorKind::BatchTimeout).unwrap(), "\"batch_timeout\"");
        assert_eq!(ErrorKind::InvalidArguments.as_str(), "invalid_arguments");
    }
}
