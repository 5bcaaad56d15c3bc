use agentloop::controller::{AnyOf, ControllerConfig, CriticalToolFailure, ErrorBudget, LowConfidence};
use agentloop::history::HistoryConfig;
use agentloop::llm::AnthropicConfig;
use agentloop::llm::anthropic::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use agentloop::tools::{ExecutionConfig, SelectivePolicy, StrategyMode};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub controller: ControllerSection,
    pub execution: ExecutionSection,
    pub selective: SelectiveSection,
    pub history: HistorySection,
    pub termination: TerminationSection,
    pub llm: LlmSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    pub max_iterations: u32,
    /// Wall-clock budget per activity; null disables it
    pub timeout_ms: Option<u64>,
    pub strategy: StrategyMode,
    pub max_recovery_rounds: u32,
    pub max_reasoning_failures: u32,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            timeout_ms: Some(30000),
            strategy: StrategyMode::Auto,
            max_recovery_rounds: 3,
            max_reasoning_failures: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub pool_size: usize,
    pub batch_timeout_ms: u64,
    pub tool_timeout_ms: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            pool_size: 5,
            batch_timeout_ms: 30000,
            tool_timeout_ms: 10000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectiveSection {
    pub priorities: HashMap<String, i32>,
    pub default_priority: i32,
    pub redundancy_groups: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    pub max_entries: usize,
    pub summarize_threshold_chars: usize,
    pub raw_tail_chars: usize,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            max_entries: 10,
            summarize_threshold_chars: 3000,
            raw_tail_chars: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationSection {
    pub min_confidence: Option<f64>,
    pub max_errors: Option<usize>,
    pub critical_tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
    /// Override for the Messages endpoint, e.g. a proxy
    pub api_url: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            timeout_ms: 120000,
            api_url: None,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        let c = &self.controller;
        ControllerConfig {
            max_iterations: c.max_iterations,
            timeout: c.timeout_ms.map(Duration::from_millis),
            strategy: c.strategy,
            max_recovery_rounds: c.max_recovery_rounds,
            max_reasoning_failures: c.max_reasoning_failures,
        }
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            pool_size: self.execution.pool_size,
            batch_timeout: Duration::from_millis(self.execution.batch_timeout_ms),
            tool_timeout: Duration::from_millis(self.execution.tool_timeout_ms),
        }
    }

    pub fn selective_policy(&self) -> SelectivePolicy {
        let mut policy = SelectivePolicy::new().with_default_priority(self.selective.default_priority);
        for (tool, priority) in &self.selective.priorities {
            policy = policy.with_priority(tool.clone(), *priority);
        }
        for group in &self.selective.redundancy_groups {
            policy = policy.with_redundancy_group(group.iter().cloned());
        }
        policy
    }

    pub fn history_config(&self) -> HistoryConfig {
        HistoryConfig {
            max_entries: self.history.max_entries,
            summarize_threshold_chars: self.history.summarize_threshold_chars,
            raw_tail_chars: self.history.raw_tail_chars,
        }
    }

    /// Termination rules enabled in config; empty means never terminate early
    pub fn termination(&self) -> AnyOf {
        let t = &self.termination;
        let mut predicate = AnyOf::new();
        if let Some(threshold) = t.min_confidence {
            predicate = predicate.with(LowConfidence { threshold });
        }
        if let Some(max_errors) = t.max_errors {
            predicate = predicate.with(ErrorBudget { max_errors });
        }
        if !t.critical_tools.is_empty() {
            predicate = predicate.with(CriticalToolFailure::new(t.critical_tools.iter().cloned()));
        }
        predicate
    }

    pub fn anthropic_config(&self) -> AnthropicConfig {
        let mut config = AnthropicConfig {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            timeout: Duration::from_millis(self.llm.timeout_ms),
            ..Default::default()
        };
        if let Some(url) = &self.llm.api_url {
            config.api_url = url.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_runtime_defaults() {
        let config = Config::default();
        let controller = config.controller_config();
        assert_eq!(controller.max_iterations, ControllerConfig::default().max_iterations);
        assert_eq!(controller.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.execution_config().pool_size, 5);
        assert_eq!(config.history_config().max_entries, 10);
        assert!(config.termination().is_empty());
        assert_eq!(config.anthropic_config().api_url, AnthropicConfig::default().api_url);
    }

    #[test]
    fn test_load_partial_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agentloop.yml");
        fs::write(
            &path,
            "controller:\n  max_iterations: 8\n  strategy: selective\n  timeout_ms: null\n\
             selective:\n  priorities:\n    search: 10\n  redundancy_groups:\n    - [search, search_backup]\n\
             termination:\n  min_confidence: 0.2\n  critical_tools: [payments]\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        let controller = config.controller_config();
        assert_eq!(controller.max_iterations, 8);
        assert_eq!(controller.strategy, StrategyMode::Selective);
        assert_eq!(controller.timeout, None);
        // untouched sections keep defaults
        assert_eq!(controller.max_recovery_rounds, 3);
        assert_eq!(config.execution.tool_timeout_ms, 10000);

        assert_eq!(config.selective_policy().priority("search"), 10);
        assert!(!config.termination().is_empty());
    }

    #[test]
    fn test_bad_strategy_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agentloop.yml");
        fs::write(&path, "controller:\n  strategy: random\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = PathBuf::from("/nonexistent/agentloop.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
