//! Tool registry and tool invocation layer
//!
//! Tools are registered on an explicitly constructed [`ToolRegistry`] that the
//! controller receives at activity creation. The [`Dispatcher`] executes a batch
//! of calls under a sequential, parallel or selective strategy.

mod builtin;
mod catalog;
mod invoke;
mod registry;
mod strategy;

pub use builtin::{CurrentTimeTool, EchoTool};
pub use catalog::{ToolCatalog, ToolSpec};
pub use invoke::{ToolInvoker, validate_arguments};
pub(crate) use invoke::panic_message;
pub use registry::ToolRegistry;
pub use strategy::{Dispatcher, ExecutionConfig, ExecutionStrategy, SelectivePolicy, StrategyMode};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::Parameters;

/// A named operation the controller can invoke on the reasoner's behalf
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as the reasoner refers to it
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON Schema for input parameters
    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Run the tool
    async fn invoke(&self, parameters: Parameters) -> Result<Value, ToolError>;
}

/// Failure reported by a tool itself
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
