//! Deterministic rendering of history entries

use crate::domain::ConversationEntry;

/// Render one entry as a labeled block
pub fn format_entry(entry: &ConversationEntry) -> String {
    if entry.is_summary() {
        return format!("[Previous Summary]: {}", entry.reasoning);
    }

    let mut lines = vec![
        format!("Iteration {}:", entry.index),
        format!("  Reasoning: {}", entry.reasoning),
    ];
    if !entry.tool_names.is_empty() {
        lines.push(format!("  Tools: {}", entry.tool_names.join(", ")));
        lines.push(format!("  Results: {}", entry.results_summary));
    }
    if !entry.errors.is_empty() {
        lines.push(format!("  Errors: {}", entry.errors.join("; ")));
    }
    lines.join("\n")
}

/// Render all entries, blank-line separated
pub fn format_entries(entries: &[ConversationEntry]) -> String {
    if entries.is_empty() {
        return "(no history yet)".to_string();
    }
    entries.iter().map(format_entry).collect::<Vec<_>>().join("\n\n")
}

/// Last `n` characters of `text`, on a char boundary
pub fn tail_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    let skip = count - n;
    match text.char_indices().nth(skip) {
        Some((offset, _)) => &text[offset..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, ToolCall, ToolExecutionResult};
    use serde_json::json;

    #[test]
    fn test_format_summary_entry() {
        let entry = ConversationEntry::summary("did things");
        assert_eq!(format_entry(&entry), "[Previous Summary]: did things");
    }

    #[test]
    fn test_format_entry_with_tools_and_errors() {
        let ok = ToolCall::from_json("echo", json!({"text": "a"}));
        let bad = ToolCall::from_json("lookup_weather", json!({}));
        let entry = ConversationEntry::new(
            2,
            "gather data",
            vec![
                ToolExecutionResult::success(&ok, json!("a"), 1),
                ToolExecutionResult::failure(&bad, ErrorKind::ExecutionFailed, "down", 1),
            ],
        );

        assert_eq!(
            format_entry(&entry),
            "Iteration 2:\n  Reasoning: gather data\n  Tools: echo, lookup_weather\n  \
             Results: echo: ok; lookup_weather: error (down)\n  Errors: lookup_weather: error (down)"
        );
    }

    #[test]
    fn test_format_entry_without_tools() {
        let entry = ConversationEntry::new(1, "just thinking", Vec::new());
        assert_eq!(format_entry(&entry), "Iteration 1:\n  Reasoning: just thinking");
    }

    #[test]
    fn test_format_entries_empty() {
        assert_eq!(format_entries(&[]), "(no history yet)");
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
        assert_eq!(tail_chars("abc", 0), "");
    }
}
