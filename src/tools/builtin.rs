//! Small built-in tools used by the command line front end

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use super::{Tool, ToolError};
use crate::domain::Parameters;

/// Returns its `text` argument unchanged
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to echo" }
            },
            "required": ["text"]
        })
    }

    async fn invoke(&self, parameters: Parameters) -> Result<Value, ToolError> {
        let text = parameters
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("text must be a string".to_string()))?;
        Ok(json!(text))
    }
}

/// Reports the current UTC time
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Return the current UTC date and time in RFC 3339 format."
    }

    async fn invoke(&self, _parameters: Parameters) -> Result<Value, ToolError> {
        Ok(json!({ "utc": Utc::now().to_rfc3339() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_text() {
        let mut params = Parameters::new();
        params.insert("text".to_string(), json!("hello"));
        assert_eq!(EchoTool.invoke(params).await.unwrap(), json!("hello"));
    }

    #[tokio::test]
    async fn test_echo_rejects_non_string() {
        let mut params = Parameters::new();
        params.insert("text".to_string(), json!(42));
        assert!(matches!(
            EchoTool.invoke(params).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn test_current_time_is_rfc3339() {
        let value = CurrentTimeTool.invoke(Parameters::new()).await.unwrap();
        let stamp = value["utc"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }
}
