//! Local correction of reasoner output
//!
//! Nothing here fails: every inconsistency is repaired and reported as a
//! [`ValidationIssue`] so the controller can log it and carry on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::ReasoningOutput;
use crate::tools::ToolCatalog;

/// Confidence ceiling applied to fallback decisions
const FALLBACK_CONFIDENCE: f64 = 0.2;

/// Final response used when the reasoner stops without one
pub const DEFAULT_FINAL_RESPONSE: &str = "I've completed the analysis based on the available information.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    ConfidenceOutOfRange { value: f64 },
    UnknownTool { tool_name: String },
    ToolsRequestedWithoutCalls,
    CallsWithoutToolUse,
    MissingFinalResponse,
    MalformedOutput { detail: String },
}

impl ValidationIssue {
    /// Issues that replaced the whole decision with a fallback
    pub fn forced_fallback(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool { .. } | Self::ToolsRequestedWithoutCalls | Self::MalformedOutput { .. }
        )
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfidenceOutOfRange { value } => write!(f, "confidence {} out of range", value),
            Self::UnknownTool { tool_name } => write!(f, "unknown tool requested: {}", tool_name),
            Self::ToolsRequestedWithoutCalls => write!(f, "tools requested but no tool calls given"),
            Self::CallsWithoutToolUse => write!(f, "tool calls given while tool use was off"),
            Self::MissingFinalResponse => write!(f, "stopped without a final response"),
            Self::MalformedOutput { detail } => write!(f, "malformed output: {}", detail),
        }
    }
}

/// A corrected output plus what had to be corrected
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub output: ReasoningOutput,
    pub issues: Vec<ValidationIssue>,
}

impl Validated {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn used_fallback(&self) -> bool {
        self.issues.iter().any(ValidationIssue::forced_fallback)
    }

    /// Fallback decision for output that could not be parsed at all
    pub fn malformed(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            output: ReasoningOutput::fallback(format!("Reasoner output could not be used ({}); reconsidering.", detail)),
            issues: vec![ValidationIssue::MalformedOutput { detail }],
        }
    }
}

fn demote_to_fallback(output: &mut ReasoningOutput, why: &str) {
    output.should_use_tools = false;
    output.tool_calls.clear();
    output.should_continue = true;
    output.final_response = None;
    output.confidence = output.confidence.min(FALLBACK_CONFIDENCE);
    output.continuation_reasoning = format!("Requested tools were not usable ({}); reconsidering.", why);
}

/// Check one output against the catalog it was produced for
pub fn validate(mut output: ReasoningOutput, catalog: &ToolCatalog) -> Validated {
    let mut issues = Vec::new();

    if !(0.0..=1.0).contains(&output.confidence) {
        issues.push(ValidationIssue::ConfidenceOutOfRange {
            value: output.confidence,
        });
        output.confidence = if output.confidence.is_nan() {
            0.0
        } else {
            output.confidence.clamp(0.0, 1.0)
        };
    }

    if !output.should_use_tools && !output.tool_calls.is_empty() {
        issues.push(ValidationIssue::CallsWithoutToolUse);
        output.tool_calls.clear();
    }

    if output.should_use_tools {
        let unknown: Vec<String> = output
            .tool_calls
            .iter()
            .filter(|c| !catalog.contains(c.tool_name()))
            .map(|c| c.tool_name().to_string())
            .collect();

        if output.tool_calls.is_empty() {
            issues.push(ValidationIssue::ToolsRequestedWithoutCalls);
            demote_to_fallback(&mut output, "no tool calls given");
        } else if !unknown.is_empty() {
            let why = format!("unknown tools: {}", unknown.join(", "));
            issues.extend(unknown.into_iter().map(|tool_name| ValidationIssue::UnknownTool { tool_name }));
            demote_to_fallback(&mut output, &why);
        }
    }

    // Calls on a stopping output still run; the answer is delivered after them
    if !output.should_continue && output.final_response.as_deref().is_none_or(|r| r.trim().is_empty()) {
        issues.push(ValidationIssue::MissingFinalResponse);
        output.final_response = Some(DEFAULT_FINAL_RESPONSE.to_string());
    }

    for issue in &issues {
        log::warn!("Corrected reasoner output: {}", issue);
    }

    Validated { output, issues }
}
