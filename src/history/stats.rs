//! Aggregate statistics over history entries

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::ConversationEntry;

/// Number of tools reported in `most_used_tools`
const TOP_TOOLS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Verbatim iteration entries (summaries excluded)
    pub total_iterations: usize,
    pub total_tool_calls: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub skipped_calls: usize,
    /// Successful share of dispatched calls; 0 when nothing ran
    pub success_rate: f64,
    /// Most frequently dispatched tools, highest count first
    pub most_used_tools: Vec<(String, usize)>,
    pub average_reasoning_chars: usize,
}

impl HistoryStats {
    pub fn from_entries(entries: &[ConversationEntry]) -> Self {
        let mut stats = Self::default();
        let mut usage: HashMap<&str, usize> = HashMap::new();
        let mut reasoning_chars = 0;

        for entry in entries.iter().filter(|e| !e.is_summary()) {
            stats.total_iterations += 1;
            reasoning_chars += entry.reasoning.chars().count();
            for result in &entry.results {
                if result.is_skipped() {
                    stats.skipped_calls += 1;
                    continue;
                }
                stats.total_tool_calls += 1;
                *usage.entry(result.tool_name.as_str()).or_default() += 1;
                if result.is_success() {
                    stats.successful_calls += 1;
                } else {
                    stats.failed_calls += 1;
                }
            }
        }

        if stats.total_tool_calls > 0 {
            stats.success_rate = stats.successful_calls as f64 / stats.total_tool_calls as f64;
        }
        if stats.total_iterations > 0 {
            stats.average_reasoning_chars = reasoning_chars / stats.total_iterations;
        }

        let mut ranked: Vec<(String, usize)> = usage.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(TOP_TOOLS);
        stats.most_used_tools = ranked;

        stats
    }
}
