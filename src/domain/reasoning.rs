//! Reasoner output and the externally consumable decision built from it

use serde::{Deserialize, Serialize};

use super::tool_call::ToolCall;

fn default_true() -> bool {
    true
}

/// Structured intent returned by one reasoner call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningOutput {
    #[serde(default)]
    pub overall_reasoning: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub should_use_tools: bool,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default = "default_true")]
    pub parallel_safe: bool,
    #[serde(default)]
    pub should_continue: bool,
    #[serde(default)]
    pub continuation_reasoning: String,
    #[serde(default)]
    pub final_response: Option<String>,
    #[serde(default)]
    pub suggested_next_action: Option<String>,
}

impl Default for ReasoningOutput {
    fn default() -> Self {
        Self {
            overall_reasoning: String::new(),
            confidence: 0.0,
            should_use_tools: false,
            tool_calls: Vec::new(),
            parallel_safe: true,
            should_continue: false,
            continuation_reasoning: String::new(),
            final_response: None,
            suggested_next_action: None,
        }
    }
}

impl ReasoningOutput {
    /// Stop with an answer
    pub fn finish(final_response: impl Into<String>) -> Self {
        Self {
            confidence: 0.9,
            final_response: Some(final_response.into()),
            ..Default::default()
        }
    }

    /// Request tools and keep going
    pub fn use_tools(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            confidence: 0.8,
            should_use_tools: true,
            tool_calls,
            should_continue: true,
            ..Default::default()
        }
    }

    /// Keep going without tools
    pub fn keep_going(next_step: impl Into<String>) -> Self {
        Self {
            confidence: 0.5,
            should_continue: true,
            suggested_next_action: Some(next_step.into()),
            ..Default::default()
        }
    }

    /// Safe no-tool decision used when an output cannot be trusted
    pub fn fallback(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            overall_reasoning: reason.clone(),
            confidence: 0.1,
            should_continue: true,
            continuation_reasoning: reason,
            ..Default::default()
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.overall_reasoning = reasoning.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn sequential_only(mut self) -> Self {
        self.parallel_safe = false;
        self
    }
}

/// Kind-specific payload of an ActionDecision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum DecisionKind {
    ToolExecution {
        tool_suggestions: Vec<ToolCall>,
        parallel_safe: bool,
        /// Answer to deliver once the batch has run, when the reasoner also stopped
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_response: Option<String>,
    },
    FinalResponse {
        final_response: String,
    },
    ErrorRecovery {
        error: String,
        should_continue: bool,
    },
    /// Keep iterating without dispatching anything this round
    Continue {
        #[serde(default)]
        next_step: Option<String>,
    },
}

impl DecisionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToolExecution { .. } => "tool_execution",
            Self::FinalResponse { .. } => "final_response",
            Self::ErrorRecovery { .. } => "error_recovery",
            Self::Continue { .. } => "continue",
        }
    }
}

/// Projection of one reasoner call for external consumers
///
/// Built only through [`ActionDecision::from_reasoning`] and
/// [`ActionDecision::error_recovery`], so each kind carries exactly its own payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDecision {
    #[serde(flatten)]
    kind: DecisionKind,
    reasoning: String,
    confidence: f64,
    iteration: u32,
    max_iterations: u32,
    processing_time_ms: u64,
}

impl ActionDecision {
    /// Project an already validated reasoner output
    pub fn from_reasoning(output: &ReasoningOutput, iteration: u32, max_iterations: u32, processing_time_ms: u64) -> Self {
        let kind = if output.should_use_tools && !output.tool_calls.is_empty() {
            DecisionKind::ToolExecution {
                tool_suggestions: output.tool_calls.clone(),
                parallel_safe: output.parallel_safe,
                final_response: if output.should_continue {
                    None
                } else {
                    output.final_response.clone()
                },
            }
        } else if !output.should_continue {
            DecisionKind::FinalResponse {
                final_response: output.final_response.clone().unwrap_or_default(),
            }
        } else {
            DecisionKind::Continue {
                next_step: output.suggested_next_action.clone(),
            }
        };

        Self {
            kind,
            reasoning: output.overall_reasoning.clone(),
            confidence: output.confidence,
            iteration,
            max_iterations,
            processing_time_ms,
        }
    }

    /// Decision produced when the reasoner could not be consulted
    pub fn error_recovery(
        error: impl Into<String>,
        should_continue: bool,
        iteration: u32,
        max_iterations: u32,
        processing_time_ms: u64,
    ) -> Self {
        let error = error.into();
        Self {
            reasoning: format!("I encountered an error: {}", error),
            kind: DecisionKind::ErrorRecovery { error, should_continue },
            confidence: 0.0,
            iteration,
            max_iterations,
            processing_time_ms,
        }
    }

    pub fn kind(&self) -> &DecisionKind {
        &self.kind
    }

    pub fn action_type(&self) -> &'static str {
        self.kind.name()
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn processing_time_ms(&self) -> u64 {
        self.processing_time_ms
    }
}
