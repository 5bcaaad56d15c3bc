//! History manager
//!
//! Keeps the per-activity entry list bounded. When it grows past
//! `max_entries`, the oldest half is condensed into one summary entry
//! (index -1) while the newer half stays verbatim.

mod format;
mod stats;

pub use format::{format_entries, format_entry, tail_chars};
pub use stats::HistoryStats;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{BackendRequest, HistorySummary, ReasoningBackend, SummaryRequest};
use crate::domain::ConversationEntry;
use crate::llm::LlmError;

/// Bounds for stored and prompted history
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Entries kept before the oldest half is summarized
    pub max_entries: usize,
    /// Formatted history longer than this is condensed before prompting
    pub summarize_threshold_chars: usize,
    /// Raw tail kept verbatim next to a prompt summary
    pub raw_tail_chars: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 10,
            summarize_threshold_chars: 3000,
            raw_tail_chars: 1000,
        }
    }
}

/// Last prompt summary, keyed by the query and formatted span it covers
#[derive(Debug, Clone, PartialEq)]
struct CachedSummary {
    user_query: String,
    formatted: String,
    rendered: String,
}

#[derive(Clone)]
pub struct HistoryManager {
    backend: Arc<dyn ReasoningBackend>,
    config: HistoryConfig,
    prompt_summary: Arc<Mutex<Option<CachedSummary>>>,
}

impl HistoryManager {
    pub fn new(backend: Arc<dyn ReasoningBackend>, config: HistoryConfig) -> Self {
        Self {
            backend,
            config,
            prompt_summary: Arc::new(Mutex::new(None)),
        }
    }

    fn cached_summary(&self) -> MutexGuard<'_, Option<CachedSummary>> {
        self.prompt_summary.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Append an entry, compressing if the cap is exceeded
    pub async fn append(&self, user_query: &str, history: &mut Vec<ConversationEntry>, entry: ConversationEntry) {
        history.push(entry);
        if history.len() > self.config.max_entries {
            self.compress(user_query, history).await;
        }
    }

    /// Replace the oldest half with a single summary entry
    pub async fn compress(&self, user_query: &str, history: &mut Vec<ConversationEntry>) {
        let split = history.len() / 2;
        if split == 0 {
            return;
        }

        let older: Vec<ConversationEntry> = history.drain(..split).collect();
        let text = match self.summarize(user_query, &older).await {
            Ok(summary) => summary.render(),
            Err(e) => {
                log::warn!("History summary request failed, using local digest: {}", e);
                local_digest(&older)
            }
        };

        log::info!("Compressed {} history entries, {} kept verbatim", older.len(), history.len());
        history.insert(0, ConversationEntry::summary(text));
    }

    async fn summarize(&self, user_query: &str, entries: &[ConversationEntry]) -> Result<HistorySummary, LlmError> {
        let request = BackendRequest::Summarize(SummaryRequest {
            user_query: user_query.to_string(),
            transcript: format_entries(entries),
            entry_count: entries.len(),
        });
        self.backend.request(request).await?.into_summary()
    }

    /// Prompt-sized substitute for an over-long formatted history
    ///
    /// Returns `formatted` unchanged when it fits under the threshold. The
    /// summary of a span is requested once and reused while the span is
    /// unchanged, so the same history always condenses to the same text.
    pub async fn condense_for_prompt(&self, user_query: &str, entries: &[ConversationEntry], formatted: &str) -> String {
        if formatted.chars().count() <= self.config.summarize_threshold_chars {
            return formatted.to_string();
        }

        let tail = tail_chars(formatted, self.config.raw_tail_chars);
        let cached = self
            .cached_summary()
            .as_ref()
            .filter(|c| c.user_query == user_query && c.formatted == formatted)
            .map(|c| c.rendered.clone());
        if let Some(rendered) = cached {
            log::debug!("Reusing prompt history summary");
            return condensed(&rendered, &tail);
        }

        match self.summarize(user_query, entries).await {
            Ok(summary) => {
                let rendered = summary.render();
                *self.cached_summary() = Some(CachedSummary {
                    user_query: user_query.to_string(),
                    formatted: formatted.to_string(),
                    rendered: rendered.clone(),
                });
                condensed(&rendered, &tail)
            }
            Err(e) => {
                log::warn!("Prompt history summary failed, truncating: {}", e);
                format!(
                    "[History Truncated]: {}",
                    tail_chars(formatted, self.config.raw_tail_chars * 2)
                )
            }
        }
    }
}

fn condensed(summary: &str, tail: &str) -> String {
    format!("[Previous History Summary]: {}\n\n[Recent History]: {}", summary, tail)
}

/// Summary text computed without the backend
pub fn local_digest(entries: &[ConversationEntry]) -> String {
    let stats = HistoryStats::from_entries(entries);
    let mut text = format!(
        "Condensed {} earlier entries: {} tool calls, {:.0}% successful",
        entries.len(),
        stats.total_tool_calls,
        stats.success_rate * 100.0
    );
    if !stats.most_used_tools.is_empty() {
        let tools: Vec<String> = stats
            .most_used_tools
            .iter()
            .map(|(name, count)| format!("{} x{}", name, count))
            .collect();
        text.push_str(&format!("; tools: {}", tools.join(", ")));
    }
    let errors: Vec<&String> = entries.iter().flat_map(|e| &e.errors).collect();
    if let Some(last) = errors.last() {
        text.push_str(&format!("; {} error(s), last: {}", errors.len(), last));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;
    use crate::domain::{ErrorKind, ToolCall, ToolExecutionResult};
    use serde_json::json;

    fn entry(index: i64) -> ConversationEntry {
        let call = ToolCall::from_json("search", json!({"q": index}));
        ConversationEntry::new(
            index,
            format!("step {}", index),
            vec![ToolExecutionResult::success(&call, json!("hit"), 2)],
        )
    }

    fn manager(backend: ScriptedBackend, max_entries: usize) -> HistoryManager {
        HistoryManager::new(
            Arc::new(backend),
            HistoryConfig {
                max_entries,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_append_under_cap_does_not_compress() {
        let history_manager = manager(ScriptedBackend::new(), 3);
        let mut history = Vec::new();
        for i in 1..=3 {
            history_manager.append("q", &mut history, entry(i)).await;
        }
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|e| !e.is_summary()));
    }

    #[tokio::test]
    async fn test_compress_uses_backend_summary() {
        let backend = ScriptedBackend::new().then_summarize(HistorySummary::new("searched five times"));
        let history_manager = manager(backend, 10);
        let mut history: Vec<ConversationEntry> = (1..=10).map(entry).collect();

        history_manager.compress("q", &mut history).await;

        assert_eq!(history.len(), 6);
        assert!(history[0].is_summary());
        assert_eq!(history[0].reasoning, "searched five times");
        assert_eq!(history[1].index, 6);
    }

    #[tokio::test]
    async fn test_append_past_cap_compresses() {
        let backend = ScriptedBackend::new().then_summarize(HistorySummary::new("early steps"));
        let history_manager = manager(backend, 4);
        let mut history = Vec::new();
        for i in 1..=5 {
            history_manager.append("q", &mut history, entry(i)).await;
        }
        // 5 entries -> oldest 2 summarized, 3 verbatim
        assert_eq!(history.len(), 4);
        assert!(history[0].is_summary());
        assert_eq!(history[1].index, 3);
    }

    #[tokio::test]
    async fn test_compress_falls_back_to_local_digest() {
        let history_manager = manager(ScriptedBackend::new(), 10);
        let mut history: Vec<ConversationEntry> = (1..=4).map(entry).collect();

        history_manager.compress("q", &mut history).await;

        assert_eq!(history.len(), 3);
        assert_eq!(
            history[0].reasoning,
            "Condensed 2 earlier entries: 2 tool calls, 100% successful; tools: search x2"
        );
    }

    #[tokio::test]
    async fn test_condense_short_history_unchanged() {
        let history_manager = manager(ScriptedBackend::new(), 10);
        let entries = vec![entry(1)];
        let formatted = format_entries(&entries);
        let condensed = history_manager.condense_for_prompt("q", &entries, &formatted).await;
        assert_eq!(condensed, formatted);
    }

    #[tokio::test]
    async fn test_condense_long_history_with_summary() {
        let backend = ScriptedBackend::new().then_summarize(HistorySummary::new("lots of searching"));
        let history_manager = HistoryManager::new(
            Arc::new(backend),
            HistoryConfig {
                summarize_threshold_chars: 50,
                raw_tail_chars: 10,
                ..Default::default()
            },
        );
        let entries: Vec<ConversationEntry> = (1..=5).map(entry).collect();
        let formatted = format_entries(&entries);

        let condensed = history_manager.condense_for_prompt("q", &entries, &formatted).await;

        assert!(condensed.starts_with("[Previous History Summary]: lots of searching"));
        assert!(condensed.ends_with(&format!("[Recent History]: {}", tail_chars(&formatted, 10))));
    }

    #[tokio::test]
    async fn test_condense_reuses_summary_until_span_changes() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .then_summarize(HistorySummary::new("first five searches"))
                .then_summarize(HistorySummary::new("first six searches")),
        );
        let history_manager = HistoryManager::new(
            backend.clone(),
            HistoryConfig {
                summarize_threshold_chars: 50,
                raw_tail_chars: 10,
                ..Default::default()
            },
        );
        let mut entries: Vec<ConversationEntry> = (1..=5).map(entry).collect();
        let formatted = format_entries(&entries);

        let first = history_manager.condense_for_prompt("q", &entries, &formatted).await;
        let second = history_manager.condense_for_prompt("q", &entries, &formatted).await;
        assert_eq!(first, second);
        assert_eq!(backend.count("summarize"), 1);

        entries.push(entry(6));
        let formatted = format_entries(&entries);
        let third = history_manager.condense_for_prompt("q", &entries, &formatted).await;
        assert!(third.starts_with("[Previous History Summary]: first six searches"));
        assert_eq!(backend.count("summarize"), 2);
    }

    #[tokio::test]
    async fn test_condense_long_history_truncates_on_failure() {
        let history_manager = HistoryManager::new(
            Arc::new(ScriptedBackend::new()),
            HistoryConfig {
                summarize_threshold_chars: 50,
                raw_tail_chars: 10,
                ..Default::default()
            },
        );
        let entries: Vec<ConversationEntry> = (1..=5).map(entry).collect();
        let formatted = format_entries(&entries);

        let condensed = history_manager.condense_for_prompt("q", &entries, &formatted).await;

        assert_eq!(condensed, format!("[History Truncated]: {}", tail_chars(&formatted, 20)));
    }

    #[test]
    fn test_local_digest_mentions_errors() {
        let call = ToolCall::from_json("lookup_weather", json!({}));
        let failed = ConversationEntry::new(
            1,
            "try weather",
            vec![ToolExecutionResult::failure(&call, ErrorKind::Timeout, "slow", 10)],
        );
        let digest = local_digest(&[failed]);
        assert!(digest.contains("0% successful"));
        assert!(digest.ends_with("1 error(s), last: lookup_weather: error (slow)"));
    }
}
