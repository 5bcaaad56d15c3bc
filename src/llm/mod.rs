//! LLM client layer
//!
//! - Message types for completion requests
//! - LlmClient trait and transport errors
//! - AnthropicClient over reqwest
//! - MockLlmClient for tests

pub mod anthropic;
pub mod client;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, LlmError, MockLlmClient};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, Usage};
