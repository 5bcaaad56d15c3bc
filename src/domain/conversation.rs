//! Per-activity conversation state and history entries

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tool_call::{Parameters, ToolExecutionResult};

/// Index reserved for synthetic summary entries
pub const SUMMARY_INDEX: i64 = -1;

/// One iteration's record (or a summary of several)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub index: i64,
    pub timestamp: DateTime<Utc>,
    pub reasoning: String,
    #[serde(default)]
    pub tool_names: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<Parameters>,
    #[serde(default)]
    pub results: Vec<ToolExecutionResult>,
    #[serde(default)]
    pub results_summary: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ConversationEntry {
    /// Record of one step, derived from what was dispatched
    pub fn new(index: i64, reasoning: impl Into<String>, results: Vec<ToolExecutionResult>) -> Self {
        let tool_names = results.iter().map(|r| r.tool_name.clone()).collect();
        let parameters = results.iter().map(|r| r.parameters.clone()).collect();
        let errors = results.iter().filter(|r| r.is_error()).map(|r| r.brief()).collect();
        let results_summary = results.iter().map(|r| r.brief()).collect::<Vec<_>>().join("; ");

        Self {
            index,
            timestamp: Utc::now(),
            reasoning: reasoning.into(),
            tool_names,
            parameters,
            results,
            results_summary,
            errors,
        }
    }

    /// Synthetic entry standing in for a compressed span of history
    pub fn summary(text: impl Into<String>) -> Self {
        Self {
            index: SUMMARY_INDEX,
            timestamp: Utc::now(),
            reasoning: text.into(),
            tool_names: Vec::new(),
            parameters: Vec::new(),
            results: Vec::new(),
            results_summary: String::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn is_summary(&self) -> bool {
        self.index == SUMMARY_INDEX
    }
}

/// Mutable state of one activity, owned by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub activity_id: String,
    pub user_query: String,
    #[serde(default)]
    pub goal: Option<String>,
    pub iteration_count: u32,
    pub max_iterations: u32,
    #[serde(default)]
    pub history: Vec<ConversationEntry>,
    #[serde(default)]
    pub last_tool_results: Option<Vec<ToolExecutionResult>>,
    pub total_tool_calls: u32,
    #[serde(default)]
    pub errors_encountered: Vec<String>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub last_confidence: Option<f64>,
    /// Entries recorded so far, including ones since compressed away
    #[serde(default)]
    pub entries_recorded: u32,
    /// Consecutive recovery rounds for the current failure chain
    #[serde(default)]
    pub recovery_rounds: u32,
    /// Consecutive reasoner calls that failed at the transport level
    #[serde(default)]
    pub reasoning_failures: u32,
    /// Tools that failed during the current iteration
    #[serde(default)]
    pub iteration_failures: Vec<String>,
}

impl ConversationState {
    pub fn new(
        activity_id: impl Into<String>,
        user_query: impl Into<String>,
        goal: Option<String>,
        max_iterations: u32,
    ) -> Self {
        Self {
            activity_id: activity_id.into(),
            user_query: user_query.into(),
            goal,
            iteration_count: 0,
            max_iterations,
            history: Vec::new(),
            last_tool_results: None,
            total_tool_calls: 0,
            errors_encountered: Vec::new(),
            tools_used: Vec::new(),
            start_time: Utc::now(),
            last_confidence: None,
            entries_recorded: 0,
            recovery_rounds: 0,
            reasoning_failures: 0,
            iteration_failures: Vec::new(),
        }
    }

    /// Whether the last batch left failures nobody has dealt with yet
    pub fn has_pending_failures(&self) -> bool {
        self.last_tool_results
            .as_ref()
            .is_some_and(|results| results.iter().any(|r| r.is_error()))
    }

    pub fn failed_results(&self) -> Vec<ToolExecutionResult> {
        self.last_tool_results
            .as_ref()
            .map(|results| results.iter().filter(|r| r.is_error()).cloned().collect())
            .unwrap_or_default()
    }

    /// Fold a dispatched batch into the running totals
    pub fn record_results(&mut self, results: &[ToolExecutionResult]) {
        for result in results {
            if result.is_skipped() {
                continue;
            }
            self.total_tool_calls += 1;
            if !self.tools_used.contains(&result.tool_name) {
                self.tools_used.push(result.tool_name.clone());
            }
            if result.is_error() {
                self.errors_encountered.push(result.brief());
                self.iteration_failures.push(result.tool_name.clone());
            }
        }
    }

    /// Claim the index for the next history entry
    pub fn next_entry_index(&mut self) -> i64 {
        self.entries_recorded += 1;
        i64::from(self.entries_recorded)
    }

    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.start_time).to_std().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool_call::{ErrorKind, ToolCall};
    use serde_json::json;

    fn results() -> Vec<ToolExecutionResult> {
        let ok = ToolCall::from_json("echo", json!({"text": "a"}));
        let bad = ToolCall::from_json("lookup_weather", json!({"city": "Paris"}));
        let skip = ToolCall::from_json("echo", json!({"text": "a"}));
        vec![
            ToolExecutionResult::success(&ok, json!("a"), 3),
            ToolExecutionResult::failure(&bad, ErrorKind::ExecutionFailed, "service unavailable", 5),
            ToolExecutionResult::skipped(&skip, "duplicate"),
        ]
    }

    #[test]
    fn test_entry_from_results() {
        let entry = ConversationEntry::new(1, "check things", results());
        assert_eq!(entry.tool_names, vec!["echo", "lookup_weather", "echo"]);
        assert_eq!(entry.parameters.len(), 3);
        assert_eq!(entry.errors, vec!["lookup_weather: error (service unavailable)"]);
        assert_eq!(
            entry.results_summary,
            "echo: ok; lookup_weather: error (service unavailable); echo: skipped (duplicate)"
        );
        assert!(!entry.is_summary());
    }

    #[test]
    fn test_summary_entry() {
        let entry = ConversationEntry::summary("earlier work");
        assert!(entry.is_summary());
        assert_eq!(entry.index, SUMMARY_INDEX);
    }

    #[test]
    fn test_record_results_counts_dispatched_calls() {
        let mut state = ConversationState::new("act-1", "q", None, 5);
        state.record_results(&results());
        assert_eq!(state.total_tool_calls, 2);
        assert_eq!(state.tools_used, vec!["echo", "lookup_weather"]);
        assert_eq!(state.errors_encountered.len(), 1);
        assert_eq!(state.iteration_failures, vec!["lookup_weather"]);
    }

    #[test]
    fn test_pending_failures() {
        let mut state = ConversationState::new("act-1", "q", None, 5);
        assert!(!state.has_pending_failures());
        state.last_tool_results = Some(results());
        assert!(state.has_pending_failures());
        assert_eq!(state.failed_results().len(), 1);
    }

    #[test]
    fn test_entry_indices_are_unique() {
        let mut state = ConversationState::new("act-1", "q", None, 5);
        assert_eq!(state.next_entry_index(), 1);
        assert_eq!(state.next_entry_index(), 2);
    }
}
