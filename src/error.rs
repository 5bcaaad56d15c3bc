//! Error types for agentloop
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::llm::LlmError;

/// All error types that can surface from the library
#[derive(Debug, Error)]
pub enum AgentLoopError {
    /// Reasoning backend failed to produce a usable answer
    #[error("Backend error: {0}")]
    Backend(#[from] LlmError),

    /// Tool registration problem (duplicate or malformed tool)
    #[error("Registry error: {0}")]
    Registry(String),

    /// Illegal controller state transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Rejected runtime configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Activity log problem
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for agentloop operations
pub type Result<T> = std::result::Result<T, AgentLoopError>;
