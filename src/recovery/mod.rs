//! Recovery module
//!
//! Given the failed results of the last batch, asks the backend for one
//! strategy per failure and aggregates them into a single plan:
//! 1. Usable alternative-tool strategies win across the whole batch
//! 2. Otherwise usable retries are dispatched
//! 3. If every strategy is `skip`, the failures are marked skipped and the loop proceeds
//! 4. Anything else terminates the activity with an explanatory response

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendRequest, ReasoningBackend, RecoveryRequest};
use crate::domain::{ErrorKind, Parameters, ToolCall, ToolExecutionResult};
use crate::tools::ToolCatalog;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    Retry,
    AlternativeTool,
    Skip,
    Fail,
}

/// How to handle one failed call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    pub strategy_type: RecoveryKind,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub alternative_tool: Option<String>,
    #[serde(default)]
    pub retry_with_params: Option<Parameters>,
    #[serde(default = "default_true")]
    pub can_recover: bool,
    #[serde(default)]
    pub confidence: f64,
}

impl RecoveryStrategy {
    fn with_kind(kind: RecoveryKind, rationale: impl Into<String>) -> Self {
        Self {
            strategy_type: kind,
            rationale: rationale.into(),
            alternative_tool: None,
            retry_with_params: None,
            can_recover: !matches!(kind, RecoveryKind::Fail),
            confidence: 0.5,
        }
    }

    pub fn retry(rationale: impl Into<String>) -> Self {
        Self::with_kind(RecoveryKind::Retry, rationale)
    }

    pub fn alternative(tool: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            alternative_tool: Some(tool.into()),
            ..Self::with_kind(RecoveryKind::AlternativeTool, rationale)
        }
    }

    pub fn skip(rationale: impl Into<String>) -> Self {
        Self::with_kind(RecoveryKind::Skip, rationale)
    }

    pub fn fail(rationale: impl Into<String>) -> Self {
        Self::with_kind(RecoveryKind::Fail, rationale)
    }

    pub fn with_params(mut self, params: Parameters) -> Self {
        self.retry_with_params = Some(params);
        self
    }
}

/// What the controller should do next
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryPlan {
    /// Dispatch these calls sequentially; the listed failures are set aside
    Dispatch {
        calls: Vec<ToolCall>,
        skipped: Vec<ToolExecutionResult>,
    },
    /// Mark the failures skipped and go back to reasoning
    Proceed { skipped: Vec<ToolExecutionResult> },
    /// Give up with a synthesized answer
    Terminate { final_response: String, reason: String },
}

impl RecoveryPlan {
    pub fn describe(&self) -> String {
        match self {
            Self::Dispatch { calls, skipped } => {
                let names: Vec<&str> = calls.iter().map(|c| c.tool_name()).collect();
                format!("dispatch [{}], skip {}", names.join(", "), skipped.len())
            }
            Self::Proceed { skipped } => format!("proceed, skip {}", skipped.len()),
            Self::Terminate { reason, .. } => format!("terminate: {}", reason),
        }
    }
}

/// Response used when failures cannot be recovered
pub fn exhausted_response(user_query: &str, failures: &[ToolExecutionResult]) -> String {
    let details: Vec<String> = failures
        .iter()
        .map(|f| format!("{} ({})", f.tool_name, f.error_detail.as_deref().unwrap_or("unknown error")))
        .collect();
    format!(
        "I was unable to complete \"{}\" because these tool calls failed and could not be recovered: {}.",
        user_query,
        details.join("; ")
    )
}

struct Candidate<'a> {
    failure: &'a ToolExecutionResult,
    strategy: RecoveryStrategy,
}

impl Candidate<'_> {
    fn alternative_call(&self, catalog: &ToolCatalog) -> Option<ToolCall> {
        let s = &self.strategy;
        if s.strategy_type != RecoveryKind::AlternativeTool || !s.can_recover {
            return None;
        }
        let tool = s.alternative_tool.as_deref()?;
        if tool == self.failure.tool_name || !catalog.contains(tool) {
            log::warn!("Ignoring unusable alternative tool {:?} for {}", tool, self.failure.tool_name);
            return None;
        }
        let params = s.retry_with_params.clone().unwrap_or_else(|| self.failure.parameters.clone());
        Some(ToolCall::new(tool, params).with_rationale(s.rationale.clone()))
    }

    fn retry_call(&self, catalog: &ToolCatalog) -> Option<ToolCall> {
        let s = &self.strategy;
        if s.strategy_type != RecoveryKind::Retry || !s.can_recover {
            return None;
        }
        if self.failure.error_kind == Some(ErrorKind::NotFound) || !catalog.contains(&self.failure.tool_name) {
            return None;
        }
        let params = s.retry_with_params.clone().unwrap_or_else(|| self.failure.parameters.clone());
        Some(ToolCall::new(self.failure.tool_name.clone(), params).with_rationale(s.rationale.clone()))
    }
}

/// Turns failures into a recovery plan via the backend
#[derive(Clone)]
pub struct RecoveryModule {
    backend: Arc<dyn ReasoningBackend>,
}

impl RecoveryModule {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    /// Ask for one strategy; backend trouble counts as `fail`
    async fn strategy_for(&self, failure: &ToolExecutionResult, user_query: &str, catalog: &ToolCatalog) -> RecoveryStrategy {
        let request = BackendRequest::Recover(RecoveryRequest {
            user_query: user_query.to_string(),
            failure: failure.clone(),
            available_tools: catalog.names(),
        });
        match self.backend.request(request).await.and_then(|r| r.into_recovery()) {
            Ok(strategy) => strategy,
            Err(e) => {
                log::warn!("Recovery strategy request for {} failed: {}", failure.tool_name, e);
                RecoveryStrategy::fail(format!("no strategy available: {}", e))
            }
        }
    }

    pub async fn plan(&self, failures: &[ToolExecutionResult], user_query: &str, catalog: &ToolCatalog) -> RecoveryPlan {
        if failures.is_empty() {
            return RecoveryPlan::Proceed { skipped: Vec::new() };
        }

        let mut candidates = Vec::with_capacity(failures.len());
        for failure in failures {
            let strategy = self.strategy_for(failure, user_query, catalog).await;
            log::info!(
                "Recovery strategy for {}: {:?} ({})",
                failure.tool_name,
                strategy.strategy_type,
                strategy.rationale
            );
            candidates.push(Candidate { failure, strategy });
        }

        let alternatives: Vec<Option<ToolCall>> = candidates.iter().map(|c| c.alternative_call(catalog)).collect();
        let chosen = if alternatives.iter().any(Option::is_some) {
            alternatives
        } else {
            candidates.iter().map(|c| c.retry_call(catalog)).collect()
        };

        if chosen.iter().any(Option::is_some) {
            let mut calls = Vec::new();
            let mut skipped = Vec::new();
            for (candidate, call) in candidates.iter().zip(chosen) {
                match call {
                    Some(call) => calls.push(call),
                    None => skipped.push(
                        candidate
                            .failure
                            .clone()
                            .into_skipped("set aside in favour of other recovery calls"),
                    ),
                }
            }
            return RecoveryPlan::Dispatch { calls, skipped };
        }

        if candidates.iter().all(|c| c.strategy.strategy_type == RecoveryKind::Skip) {
            let skipped = candidates
                .iter()
                .map(|c| c.failure.clone().into_skipped(format!("skipped by recovery: {}", c.strategy.rationale)))
                .collect();
            return RecoveryPlan::Proceed { skipped };
        }

        RecoveryPlan::Terminate {
            final_response: exhausted_response(user_query, failures),
            reason: "no viable recovery strategy".to_string(),
        }
    }
}
