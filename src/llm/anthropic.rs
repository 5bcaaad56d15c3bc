//! Anthropic Messages API client
//!
//! Request and reply bodies are typed; only text content blocks are read back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::client::{LlmClient, LlmError};
use super::types::{CompletionRequest, CompletionResponse, Message, StopReason, Usage};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Seconds to wait when a 429 carries no usable retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Decisions should be reproducible, so this defaults to 0
    pub temperature: f32,
    pub timeout: Duration,
    pub api_url: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            timeout: Duration::from_secs(120),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<StopReason>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Readable message from an error body, falling back to the raw text
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("{}: {}", envelope.error.kind, envelope.error.message),
        Err(_) if body.trim().is_empty() => "empty error body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

pub struct AnthropicClient {
    http: Client,
    api_key: String,
    config: AnthropicConfig,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl AnthropicClient {
    /// Client keyed from `ANTHROPIC_API_KEY`
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| LlmError::MissingApiKey {
            env_var: API_KEY_ENV.to_string(),
        })?;
        Self::with_api_key(api_key, config)
    }

    pub fn with_api_key(api_key: impl Into<String>, config: AnthropicConfig) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            config,
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        })
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> MessagesBody<'a> {
        MessagesBody {
            model: &self.config.model,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature.unwrap_or(self.config.temperature),
            system: &request.system,
            messages: &request.messages,
        }
    }

    fn into_response(&self, reply: MessagesReply) -> CompletionResponse {
        self.input_tokens.fetch_add(reply.usage.input_tokens, Ordering::Relaxed);
        self.output_tokens.fetch_add(reply.usage.output_tokens, Ordering::Relaxed);

        let content = reply
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        CompletionResponse {
            content,
            stop_reason: reply.stop_reason.unwrap_or_default(),
            usage: reply.usage,
        }
    }

    /// Tokens spent by this client so far
    pub fn total_usage(&self) -> Usage {
        Usage::new(
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.body(&request);
        let response = self
            .http
            .post(&self.config.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let reply: MessagesReply = response.json().await?;
        let response = self.into_response(reply);
        tracing::debug!(
            model = %self.config.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "Completion received"
        );
        Ok(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.config.model)
            .field("api_url", &self.config.api_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> AnthropicClient {
        AnthropicClient::with_api_key("test-key", AnthropicConfig::default()).unwrap()
    }

    #[test]
    fn test_body_uses_config_defaults() {
        let client = client();
        let request = CompletionRequest::new("Decide the next step").with_user_message("What is 2+2?");
        let body = serde_json::to_value(client.body(&request)).unwrap();

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["system"], "Decide the next step");
        assert_eq!(body["messages"][0], json!({"role": "user", "content": "What is 2+2?"}));
    }

    #[test]
    fn test_body_request_overrides_and_empty_system() {
        let client = client();
        let request = CompletionRequest::new("")
            .with_user_message("hi")
            .with_max_tokens(256)
            .with_temperature(0.5);
        let body = serde_json::to_value(client.body(&request)).unwrap();

        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["temperature"], 0.5);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_reply_keeps_text_blocks_and_counts_usage() {
        let client = client();
        let reply: MessagesReply = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "{\"should_continue\": false," },
                { "type": "thinking", "thinking": "hmm" },
                { "type": "text", "text": "\"final_response\": \"4\"}" }
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 10, "output_tokens": 5 }
        }))
        .unwrap();
        let response = client.into_response(reply);

        assert_eq!(response.content, "{\"should_continue\": false,\n\"final_response\": \"4\"}");
        assert_eq!(response.stop_reason, StopReason::EndTurn);

        let reply: MessagesReply = serde_json::from_value(json!({
            "content": [],
            "stop_reason": "max_tokens",
            "usage": { "input_tokens": 100, "output_tokens": 50 }
        }))
        .unwrap();
        assert!(client.into_response(reply).is_truncated());
        assert_eq!(client.total_usage(), Usage::new(110, 55));
    }

    #[test]
    fn test_reply_without_content_does_not_parse() {
        assert!(serde_json::from_value::<MessagesReply>(json!({"stop_reason": "end_turn"})).is_err());
    }

    #[test]
    fn test_error_message_from_envelope() {
        let body = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        assert_eq!(error_message(body), "overloaded_error: Overloaded");
        assert_eq!(error_message("  gateway timeout \n"), "gateway timeout");
        assert_eq!(error_message(""), "empty error body");
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", client());
        assert!(debug.contains(DEFAULT_MODEL));
        assert!(!debug.contains("test-key"));
    }
}
