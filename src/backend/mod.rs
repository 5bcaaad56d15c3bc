//! Reasoning backend seam
//!
//! The backend is an opaque request/response oracle. Requests have a fixed
//! schema: the tool catalog travels as data, never as a type.

mod llm;
mod scripted;

pub use llm::{LlmBackend, extract_json_object};
pub use scripted::ScriptedBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ReasoningOutput, ToolExecutionResult};
use crate::llm::LlmError;
use crate::recovery::RecoveryStrategy;
use crate::tools::ToolSpec;

/// Inputs for one next-action decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub user_query: String,
    pub goal: Option<String>,
    pub formatted_history: String,
    pub formatted_last_results: String,
    pub catalog: Vec<ToolSpec>,
    pub iteration: u32,
    pub max_iterations: u32,
}

/// Inputs for condensing a span of history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub user_query: String,
    pub transcript: String,
    pub entry_count: usize,
}

/// Inputs for choosing how to handle one failed call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub user_query: String,
    pub failure: ToolExecutionResult,
    pub available_tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum BackendRequest {
    Decide(DecisionRequest),
    Summarize(SummaryRequest),
    Recover(RecoveryRequest),
}

impl BackendRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decide(_) => "decide",
            Self::Summarize(_) => "summarize",
            Self::Recover(_) => "recover",
        }
    }
}

/// Condensed history returned by a summarize request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

impl HistorySummary {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            key_points: Vec::new(),
        }
    }

    pub fn with_key_points<I, S>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_points = points.into_iter().map(Into::into).collect();
        self
    }

    /// Text spliced into history in place of the summarized span
    pub fn render(&self) -> String {
        if self.key_points.is_empty() {
            return self.summary.clone();
        }
        let points: Vec<String> = self.key_points.iter().map(|p| format!("- {}", p)).collect();
        format!("{}\nKey points:\n{}", self.summary, points.join("\n"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum BackendResponse {
    Decision(ReasoningOutput),
    Summary(HistorySummary),
    Recovery(RecoveryStrategy),
}

impl BackendResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decision(_) => "decision",
            Self::Summary(_) => "summary",
            Self::Recovery(_) => "recovery",
        }
    }

    pub fn into_decision(self) -> Result<ReasoningOutput, LlmError> {
        match self {
            Self::Decision(output) => Ok(output),
            other => Err(mismatch("decision", &other)),
        }
    }

    pub fn into_summary(self) -> Result<HistorySummary, LlmError> {
        match self {
            Self::Summary(summary) => Ok(summary),
            other => Err(mismatch("summary", &other)),
        }
    }

    pub fn into_recovery(self) -> Result<RecoveryStrategy, LlmError> {
        match self {
            Self::Recovery(strategy) => Ok(strategy),
            other => Err(mismatch("recovery", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &BackendResponse) -> LlmError {
    LlmError::InvalidResponse(format!("expected {} response, got {}", expected, got.kind()))
}

/// Oracle that turns structured context into structured decisions
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn request(&self, request: BackendRequest) -> Result<BackendResponse, LlmError>;
}
