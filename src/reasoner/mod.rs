//! Reasoner
//!
//! Wraps one Decide request: projects the conversation state into the fixed
//! request schema, sends it, and validates the answer against the catalog
//! snapshot the request carried.

mod format;
mod validate;

pub use format::format_last_results;
pub use validate::{DEFAULT_FINAL_RESPONSE, Validated, ValidationIssue, validate};

use std::sync::Arc;

use crate::backend::{BackendRequest, DecisionRequest, ReasoningBackend};
use crate::domain::ConversationState;
use crate::history::{HistoryManager, format_entries};
use crate::llm::LlmError;
use crate::tools::ToolCatalog;

#[derive(Clone)]
pub struct Reasoner {
    backend: Arc<dyn ReasoningBackend>,
    history: HistoryManager,
}

impl Reasoner {
    pub fn new(backend: Arc<dyn ReasoningBackend>, history: HistoryManager) -> Self {
        Self { backend, history }
    }

    /// History as it goes into the prompt, condensed when too long
    pub async fn formatted_history(&self, state: &ConversationState) -> String {
        let formatted = format_entries(&state.history);
        self.history
            .condense_for_prompt(&state.user_query, &state.history, &formatted)
            .await
    }

    pub async fn build_request(&self, state: &ConversationState, catalog: &ToolCatalog) -> DecisionRequest {
        DecisionRequest {
            user_query: state.user_query.clone(),
            goal: state.goal.clone(),
            formatted_history: self.formatted_history(state).await,
            formatted_last_results: format_last_results(state.last_tool_results.as_deref()),
            catalog: catalog.specs().to_vec(),
            iteration: state.iteration_count,
            max_iterations: state.max_iterations,
        }
    }

    /// One reasoning step
    ///
    /// Malformed answers come back as a fallback decision; only transport
    /// failures are returned as errors.
    pub async fn decide(&self, state: &ConversationState, catalog: &ToolCatalog) -> Result<Validated, LlmError> {
        let request = self.build_request(state, catalog).await;
        let reply = self
            .backend
            .request(BackendRequest::Decide(request))
            .await
            .and_then(|r| r.into_decision());

        match reply {
            Ok(output) => Ok(validate(output, catalog)),
            Err(e) if e.is_malformed_output() => {
                log::warn!("Reasoner output malformed, using fallback: {}", e);
                Ok(Validated::malformed(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HistorySummary, ScriptedBackend};
    use crate::domain::{ConversationEntry, ReasoningOutput, ToolCall, ToolExecutionResult};
    use crate::history::HistoryConfig;
    use crate::tools::ToolSpec;
    use serde_json::json;

    fn catalog() -> ToolCatalog {
        ToolCatalog::new(vec![ToolSpec {
            name: "echo".to_string(),
            description: "Echo text".to_string(),
            parameters: json!({"type": "object"}),
        }])
    }

    fn reasoner(backend: Arc<ScriptedBackend>, config: HistoryConfig) -> Reasoner {
        let history = HistoryManager::new(backend.clone(), config);
        Reasoner::new(backend, history)
    }

    fn state() -> ConversationState {
        let mut state = ConversationState::new("act-1", "say hi", Some("greet".to_string()), 5);
        state.iteration_count = 2;
        let call = ToolCall::from_json("echo", json!({"text": "hi"}));
        let results = vec![ToolExecutionResult::success(&call, json!("hi"), 1)];
        state.history.push(ConversationEntry::new(1, "echo first", results.clone()));
        state.last_tool_results = Some(results);
        state
    }

    #[tokio::test]
    async fn test_build_request_projects_state() {
        let backend = Arc::new(ScriptedBackend::new());
        let reasoner = reasoner(backend, HistoryConfig::default());

        let request = reasoner.build_request(&state(), &catalog()).await;
        assert_eq!(request.user_query, "say hi");
        assert_eq!(request.goal.as_deref(), Some("greet"));
        assert_eq!(request.iteration, 2);
        assert_eq!(request.max_iterations, 5);
        assert_eq!(request.catalog.len(), 1);
        assert!(request.formatted_history.starts_with("Iteration 1:"));
        assert!(request.formatted_last_results.starts_with("1. echo"));
    }

    #[tokio::test]
    async fn test_formatting_same_state_twice_is_identical() {
        let backend = Arc::new(ScriptedBackend::new());
        let reasoner = reasoner(backend, HistoryConfig::default());
        let state = state();

        let first = reasoner.build_request(&state, &catalog()).await;
        let second = reasoner.build_request(&state, &catalog()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_long_history_condensed_in_request() {
        let backend = Arc::new(ScriptedBackend::new().then_summarize(HistorySummary::new("echoed a lot")));
        let reasoner = reasoner(
            backend.clone(),
            HistoryConfig {
                summarize_threshold_chars: 20,
                raw_tail_chars: 5,
                ..Default::default()
            },
        );

        let request = reasoner.build_request(&state(), &catalog()).await;
        assert!(request.formatted_history.starts_with("[Previous History Summary]: echoed a lot"));
        assert_eq!(backend.count("summarize"), 1);
    }

    #[tokio::test]
    async fn test_condensed_history_is_stable_across_calls() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .then_summarize(HistorySummary::new("echoed five times"))
                .then_summarize(HistorySummary::new("something else")),
        );
        let reasoner = reasoner(
            backend.clone(),
            HistoryConfig {
                summarize_threshold_chars: 50,
                raw_tail_chars: 10,
                ..Default::default()
            },
        );
        let mut state = state();
        for i in 2..=5 {
            let call = ToolCall::from_json("echo", json!({"text": i}));
            let results = vec![ToolExecutionResult::success(&call, json!(i), 1)];
            state.history.push(ConversationEntry::new(i, "echo again", results));
        }

        let first = reasoner.formatted_history(&state).await;
        let second = reasoner.formatted_history(&state).await;
        assert_eq!(first, second);
        assert!(first.starts_with("[Previous History Summary]: echoed five times"));
        assert_eq!(backend.count("summarize"), 1);
    }

    #[tokio::test]
    async fn test_decide_validates_against_catalog() {
        let backend = Arc::new(
            ScriptedBackend::new().then_decide(ReasoningOutput::use_tools(vec![ToolCall::from_json("nope", json!({}))])),
        );
        let reasoner = reasoner(backend, HistoryConfig::default());

        let validated = reasoner.decide(&state(), &catalog()).await.unwrap();
        assert!(validated.used_fallback());
        assert!(validated.output.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_decide_malformed_output_falls_back() {
        let backend = Arc::new(ScriptedBackend::new().then_decide_err(LlmError::InvalidResponse("garbage".to_string())));
        let reasoner = reasoner(backend, HistoryConfig::default());

        let validated = reasoner.decide(&state(), &catalog()).await.unwrap();
        assert!(matches!(validated.issues[0], ValidationIssue::MalformedOutput { .. }));
        assert!(validated.output.should_continue);
    }

    #[tokio::test]
    async fn test_decide_transport_error_propagates() {
        let backend = Arc::new(ScriptedBackend::new().then_decide_err(LlmError::Unavailable("down".to_string())));
        let reasoner = reasoner(backend, HistoryConfig::default());

        let err = reasoner.decide(&state(), &catalog()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
