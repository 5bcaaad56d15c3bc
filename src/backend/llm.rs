//! Reasoning backend over any LlmClient
//!
//! Renders each structured request into a prompt asking for a single JSON
//! object, then parses that object back into the typed response.

use async_trait::async_trait;

use super::{BackendRequest, BackendResponse, DecisionRequest, ReasoningBackend, RecoveryRequest, SummaryRequest};
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::tools::ToolSpec;

const DECIDE_SYSTEM: &str = "You are the reasoning step of a tool-using agent. You never run tools yourself: \
you decide whether to continue, which tools to request and with what arguments, or give the final answer. \
Only request tools listed in the catalog. Reply with exactly one JSON object.";

const SUMMARIZE_SYSTEM: &str = "You condense an agent's working history. Keep facts, tool outcomes and open \
questions; drop repetition. Reply with exactly one JSON object.";

const RECOVER_SYSTEM: &str = "You decide how an agent should handle one failed tool call: retry (optionally with \
new parameters), use an alternative tool from the available list, skip it, or fail. Reply with exactly one JSON object.";

const DECISION_SCHEMA: &str = r#"{"overall_reasoning": string, "confidence": number between 0 and 1, "should_use_tools": boolean, "tool_calls": [{"tool_name": string, "parameters": object, "rationale": string}], "parallel_safe": boolean, "should_continue": boolean, "continuation_reasoning": string, "final_response": string or null, "suggested_next_action": string or null}"#;

const SUMMARY_SCHEMA: &str = r#"{"summary": string, "key_points": [string]}"#;

const RECOVERY_SCHEMA: &str = r#"{"strategy_type": "retry" | "alternative_tool" | "skip" | "fail", "rationale": string, "alternative_tool": string or null, "retry_with_params": object or null, "can_recover": boolean, "confidence": number between 0 and 1}"#;

/// Default token limit for backend answers
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Slice out the outermost `{...}` of a reply that may carry prose around it
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn format_catalog(catalog: &[ToolSpec]) -> String {
    if catalog.is_empty() {
        return "(no tools available)".to_string();
    }
    serde_json::to_string_pretty(catalog).unwrap_or_else(|_| {
        catalog.iter().map(|t| t.name.clone()).collect::<Vec<_>>().join(", ")
    })
}

fn render_decision(request: &DecisionRequest) -> String {
    let mut iteration = format!("{} of {}", request.iteration, request.max_iterations);
    if request.iteration >= request.max_iterations {
        iteration.push_str(" (last iteration: give a final answer if at all possible)");
    }

    format!(
        "User query: {}\nGoal: {}\nIteration: {}\n\nConversation history:\n{}\n\nLast tool results:\n{}\n\n\
         Available tools:\n{}\n\nRespond with JSON of the form:\n{}",
        request.user_query,
        request.goal.as_deref().unwrap_or("(none)"),
        iteration,
        request.formatted_history,
        request.formatted_last_results,
        format_catalog(&request.catalog),
        DECISION_SCHEMA,
    )
}

fn render_summary(request: &SummaryRequest) -> String {
    format!(
        "User query: {}\n\nSummarize these {} history entries:\n{}\n\nRespond with JSON of the form:\n{}",
        request.user_query, request.entry_count, request.transcript, SUMMARY_SCHEMA,
    )
}

fn render_recovery(request: &RecoveryRequest) -> String {
    let failure = &request.failure;
    let parameters = serde_json::to_string(&failure.parameters).unwrap_or_else(|_| "{}".to_string());
    format!(
        "User query: {}\n\nFailed tool: {}\nParameters: {}\nError kind: {}\nError: {}\n\nAvailable tools: {}\n\n\
         Respond with JSON of the form:\n{}",
        request.user_query,
        failure.tool_name,
        parameters,
        failure.error_kind.map(|k| k.as_str()).unwrap_or("unknown"),
        failure.error_detail.as_deref().unwrap_or("unknown error"),
        request.available_tools.join(", "),
        RECOVERY_SCHEMA,
    )
}

/// Backend that asks an LLM for each structured answer
pub struct LlmBackend<C: LlmClient> {
    client: C,
    max_tokens: u32,
}

impl<C: LlmClient> LlmBackend<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn render(&self, request: &BackendRequest) -> CompletionRequest {
        let (system, prompt) = match request {
            BackendRequest::Decide(r) => (DECIDE_SYSTEM, render_decision(r)),
            BackendRequest::Summarize(r) => (SUMMARIZE_SYSTEM, render_summary(r)),
            BackendRequest::Recover(r) => (RECOVER_SYSTEM, render_recovery(r)),
        };
        CompletionRequest::new(system)
            .with_user_message(prompt)
            .with_max_tokens(self.max_tokens)
    }
}

#[async_trait]
impl<C: LlmClient> ReasoningBackend for LlmBackend<C> {
    async fn request(&self, request: BackendRequest) -> Result<BackendResponse, LlmError> {
        let completion = self.render(&request);
        let response = self.client.complete(completion).await?;
        let json = extract_json_object(&response.content).ok_or_else(|| {
            let why = if response.is_truncated() {
                "reply truncated at max_tokens before any JSON object"
            } else {
                "reply contains no JSON object"
            };
            LlmError::InvalidResponse(why.to_string())
        })?;

        tracing::debug!(kind = request.kind(), model = self.client.model(), "Parsed backend reply");

        Ok(match request {
            BackendRequest::Decide(_) => BackendResponse::Decision(serde_json::from_str(json)?),
            BackendRequest::Summarize(_) => BackendResponse::Summary(serde_json::from_str(json)?),
            BackendRequest::Recover(_) => BackendResponse::Recovery(serde_json::from_str(json)?),
        })
    }
}
