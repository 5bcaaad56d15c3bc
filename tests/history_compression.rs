//! History compression integration tests

use std::sync::Arc;

use agentloop::backend::{HistorySummary, ScriptedBackend};
use agentloop::domain::{ConversationEntry, ToolCall, ToolExecutionResult};
use agentloop::history::{HistoryConfig, HistoryManager, HistoryStats};
use agentloop::llm::LlmError;
use serde_json::json;

fn entry(index: i64) -> ConversationEntry {
    let call = ToolCall::from_json("search", json!({ "q": format!("step {}", index) }));
    ConversationEntry::new(
        index,
        format!("step {} reasoning", index),
        vec![ToolExecutionResult::success(&call, json!("hit"), 2)],
    )
}

fn entries(n: i64) -> Vec<ConversationEntry> {
    (1..=n).map(entry).collect()
}

#[tokio::test]
async fn test_compress_twelve_entries() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .then_summarize(HistorySummary::new("Searched six times.").with_key_points(["all hits"])),
    );
    let manager = HistoryManager::new(backend.clone(), HistoryConfig::default());

    let mut history = entries(12);
    manager.compress("find things", &mut history).await;

    assert_eq!(history.len(), 7);
    assert!(history[0].is_summary());
    assert_eq!(history[0].reasoning, "Searched six times.\nKey points:\n- all hits");
    let kept: Vec<i64> = history[1..].iter().map(|e| e.index).collect();
    assert_eq!(kept, vec![7, 8, 9, 10, 11, 12]);
    assert_eq!(backend.count("summarize"), 1);
}

#[tokio::test]
async fn test_append_past_cap_compresses() {
    let backend = Arc::new(ScriptedBackend::new().then_summarize(HistorySummary::new("older work")));
    let config = HistoryConfig {
        max_entries: 11,
        ..Default::default()
    };
    let manager = HistoryManager::new(backend, config);

    let mut history = entries(11);
    manager.append("find things", &mut history, entry(12)).await;

    assert_eq!(history.len(), 7);
    assert_eq!(history[0].reasoning, "older work");
    assert_eq!(history.last().map(|e| e.index), Some(12));
}

#[tokio::test]
async fn test_backend_failure_falls_back_to_local_digest() {
    let backend = Arc::new(ScriptedBackend::new().then_summarize_err(LlmError::Unavailable("down".to_string())));
    let manager = HistoryManager::new(backend, HistoryConfig::default());

    let mut history = entries(4);
    manager.compress("q", &mut history).await;

    assert_eq!(history.len(), 3);
    assert!(history[0].is_summary());
    assert!(history[0].reasoning.starts_with("Condensed 2 earlier entries: 2 tool calls, 100% successful"));
}

#[tokio::test]
async fn test_single_entry_is_not_compressed() {
    let manager = HistoryManager::new(Arc::new(ScriptedBackend::new()), HistoryConfig::default());
    let mut history = entries(1);
    manager.compress("q", &mut history).await;
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_summary());
}

#[tokio::test]
async fn test_condense_for_prompt_keeps_recent_tail() {
    let backend = Arc::new(ScriptedBackend::new().then_summarize(HistorySummary::new("lots happened")));
    let config = HistoryConfig {
        summarize_threshold_chars: 100,
        raw_tail_chars: 20,
        ..Default::default()
    };
    let manager = HistoryManager::new(backend, config);
    let history = entries(6);
    let formatted = agentloop::history::format_entries(&history);
    assert!(formatted.chars().count() > 100);

    let condensed = manager.condense_for_prompt("q", &history, &formatted).await;
    assert!(condensed.starts_with("[Previous History Summary]: lots happened\n\n[Recent History]: "));
    assert!(condensed.ends_with(agentloop::history::tail_chars(&formatted, 20)));
}

#[test]
fn test_stats_skip_summary_entries() {
    let mut history = vec![ConversationEntry::summary("earlier")];
    history.extend(entries(3));
    let stats = HistoryStats::from_entries(&history);
    assert_eq!(stats.total_iterations, 3);
    assert_eq!(stats.total_tool_calls, 3);
    assert_eq!(stats.most_used_tools, vec![("search".to_string(), 3)]);
    assert_eq!(stats.success_rate, 1.0);
}
