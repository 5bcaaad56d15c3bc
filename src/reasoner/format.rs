//! Deterministic rendering of last-iteration results for the prompt

use crate::domain::{ToolExecutionResult, ToolStatus};

/// Longest rendered result value before it is cut
const MAX_RESULT_CHARS: usize = 500;

fn clip(text: String) -> String {
    if text.chars().count() <= MAX_RESULT_CHARS {
        return text;
    }
    let mut clipped: String = text.chars().take(MAX_RESULT_CHARS).collect();
    clipped.push_str("...");
    clipped
}

fn format_result(position: usize, result: &ToolExecutionResult) -> String {
    let params = serde_json::to_string(&result.parameters).unwrap_or_else(|_| "{}".to_string());
    let head = format!("{}. {}({})", position, result.tool_name, params);
    match result.status {
        ToolStatus::Success => {
            let value = result
                .result
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "(no output)".to_string());
            format!("{} [success, {}ms]: {}", head, result.execution_time_ms, clip(value))
        }
        ToolStatus::Error => format!(
            "{} [error: {}, {}ms]: {}",
            head,
            result.error_kind.map(|k| k.as_str()).unwrap_or("unknown"),
            result.execution_time_ms,
            result.error_detail.as_deref().unwrap_or("unknown error")
        ),
        ToolStatus::Skipped => format!(
            "{} [skipped]: {}",
            head,
            result.skip_reason.as_deref().unwrap_or("no reason")
        ),
    }
}

/// Render the previous batch, one numbered line per call in dispatch order
pub fn format_last_results(results: Option<&[ToolExecutionResult]>) -> String {
    match results {
        Some(results) if !results.is_empty() => results
            .iter()
            .enumerate()
            .map(|(i, r)| format_result(i + 1, r))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "(no previous tool results)".to_string(),
    }
}
