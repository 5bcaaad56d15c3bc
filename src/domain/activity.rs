//! Terminal record of one activity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::{ConversationEntry, ConversationState};

/// How an activity ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Success,
    Timeout,
    Terminated,
    ErrorRecoveryExhausted,
    Error,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::Terminated => "terminated",
            Self::ErrorRecoveryExhausted => "error_recovery_exhausted",
            Self::Error => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable outcome handed back to the caller, exactly once per activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityResult {
    pub activity_id: String,
    pub user_query: String,
    pub status: ActivityStatus,
    pub final_response: String,
    pub iterations: u32,
    pub total_tool_calls: u32,
    pub duration_ms: u64,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub errors_encountered: Vec<String>,
    #[serde(default)]
    pub termination_reason: Option<String>,
    #[serde(default)]
    pub last_confidence: Option<f64>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<ConversationEntry>,
}

impl ActivityResult {
    pub fn from_state(
        state: &ConversationState,
        status: ActivityStatus,
        final_response: impl Into<String>,
        termination_reason: Option<String>,
    ) -> Self {
        Self {
            activity_id: state.activity_id.clone(),
            user_query: state.user_query.clone(),
            status,
            final_response: final_response.into(),
            iterations: state.iteration_count,
            total_tool_calls: state.total_tool_calls,
            duration_ms: state.elapsed().as_millis() as u64,
            tools_used: state.tools_used.clone(),
            errors_encountered: state.errors_encountered.clone(),
            termination_reason,
            last_confidence: state.last_confidence,
            completed_at: Utc::now(),
            history: state.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_state_copies_counters() {
        let mut state = ConversationState::new("act-7", "What is 2+2?", None, 5);
        state.iteration_count = 1;
        state.total_tool_calls = 0;
        state.last_confidence = Some(0.9);

        let result = ActivityResult::from_state(&state, ActivityStatus::Success, "4", None);
        assert_eq!(result.activity_id, "act-7");
        assert_eq!(result.iterations, 1);
        assert_eq!(result.final_response, "4");
        assert_eq!(result.last_confidence, Some(0.9));
        assert!(result.status.is_success());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ActivityStatus::ErrorRecoveryExhausted.to_string(), "error_recovery_exhausted");
        assert_eq!(
            serde_json::to_string(&ActivityStatus::Timeout).unwrap(),
            "\"timeout\""
        );
    }
}
