//! Batch execution strategies
//!
//! - Sequential: in order, one at a time; failures do not stop the batch
//! - Parallel: bounded worker pool with a per-batch deadline
//! - Selective: priority order with short-circuit skipping
//!
//! Every strategy returns one result per call, aligned to request order.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::invoke::ToolInvoker;
use super::registry::ToolRegistry;
use crate::domain::{ErrorKind, ToolCall, ToolExecutionResult};
use crate::error::{AgentLoopError, Result};

/// Default number of concurrent workers for the parallel strategy
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Strategy actually used for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    Sequential,
    Parallel,
    Selective,
}

/// Controller-level strategy preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// Parallel when the reasoner marks the batch safe and it has more than one call
    #[default]
    Auto,
    Sequential,
    /// Parallel unless the reasoner marks the batch unsafe
    Parallel,
    Selective,
}

impl StrategyMode {
    pub fn resolve(self, parallel_safe: bool, batch_len: usize) -> ExecutionStrategy {
        match self {
            Self::Sequential => ExecutionStrategy::Sequential,
            Self::Selective => ExecutionStrategy::Selective,
            Self::Parallel if parallel_safe => ExecutionStrategy::Parallel,
            Self::Parallel => ExecutionStrategy::Sequential,
            Self::Auto if parallel_safe && batch_len > 1 => ExecutionStrategy::Parallel,
            Self::Auto => ExecutionStrategy::Sequential,
        }
    }
}

impl FromStr for StrategyMode {
    type Err = AgentLoopError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "selective" => Ok(Self::Selective),
            other => Err(AgentLoopError::Config(format!("unknown strategy: {}", other))),
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Selective => "selective",
        };
        f.write_str(name)
    }
}

/// Limits for batch execution
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Maximum concurrent invocations in the parallel strategy
    pub pool_size: usize,
    /// Deadline for a whole parallel batch
    pub batch_timeout: Duration,
    /// Deadline for a single invocation
    pub tool_timeout: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            batch_timeout: Duration::from_secs(30),
            tool_timeout: Duration::from_secs(10),
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(AgentLoopError::Config("pool_size must be at least 1".to_string()));
        }
        if self.batch_timeout.is_zero() || self.tool_timeout.is_zero() {
            return Err(AgentLoopError::Config("timeouts must be positive".to_string()));
        }
        Ok(())
    }
}

/// Priority table and short-circuit rules for the selective strategy
///
/// Higher priority runs first; ties keep request order. A call is skipped when
/// an identical call already succeeded, or when another member of its
/// redundancy group already succeeded.
#[derive(Debug, Clone, Default)]
pub struct SelectivePolicy {
    priorities: HashMap<String, i32>,
    default_priority: i32,
    redundancy_groups: Vec<Vec<String>>,
}

impl SelectivePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, tool: impl Into<String>, priority: i32) -> Self {
        self.priorities.insert(tool.into(), priority);
        self
    }

    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn with_redundancy_group<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redundancy_groups.push(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn priority(&self, tool: &str) -> i32 {
        self.priorities.get(tool).copied().unwrap_or(self.default_priority)
    }

    /// Request indices in execution order
    pub fn order(&self, calls: &[ToolCall]) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..calls.len()).collect();
        // sort_by_key is stable, so equal priorities keep request order
        indices.sort_by_key(|&i| std::cmp::Reverse(self.priority(calls[i].tool_name())));
        indices
    }

    /// Reason to skip `call` given the calls that already succeeded
    pub fn skip_reason(&self, call: &ToolCall, satisfied: &[&ToolCall]) -> Option<String> {
        if satisfied.iter().any(|done| *done == call) {
            return Some(format!("identical {} call already succeeded", call.tool_name()));
        }

        let group = self
            .redundancy_groups
            .iter()
            .find(|group| group.iter().any(|name| name == call.tool_name()))?;
        satisfied
            .iter()
            .find(|done| group.iter().any(|name| name == done.tool_name()))
            .map(|done| format!("redundant: {} already satisfied this request", done.tool_name()))
    }
}

/// Executes batches of tool calls
#[derive(Clone)]
pub struct Dispatcher {
    invoker: ToolInvoker,
    config: ExecutionConfig,
    policy: SelectivePolicy,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, config: ExecutionConfig, policy: SelectivePolicy) -> Self {
        Self {
            invoker: ToolInvoker::new(registry, config.tool_timeout),
            config,
            policy,
        }
    }

    pub async fn dispatch(&self, strategy: ExecutionStrategy, calls: &[ToolCall]) -> Vec<ToolExecutionResult> {
        if calls.is_empty() {
            return Vec::new();
        }
        log::debug!("Dispatching {} call(s) with {:?} strategy", calls.len(), strategy);
        match strategy {
            ExecutionStrategy::Sequential => self.run_sequential(calls).await,
            ExecutionStrategy::Parallel => self.run_parallel(calls).await,
            ExecutionStrategy::Selective => self.run_selective(calls).await,
        }
    }

    async fn run_sequential(&self, calls: &[ToolCall]) -> Vec<ToolExecutionResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.invoker.invoke(call).await);
        }
        results
    }

    async fn run_parallel(&self, calls: &[ToolCall]) -> Vec<ToolExecutionResult> {
        let started = Instant::now();
        let permits = Arc::new(Semaphore::new(self.config.pool_size.max(1)));
        let mut set = JoinSet::new();

        for (index, call) in calls.iter().cloned().enumerate() {
            let invoker = self.invoker.clone();
            let permits = permits.clone();
            set.spawn(async move {
                // Semaphore is never closed; a missing permit only lifts the bound
                let _permit = permits.acquire_owned().await.ok();
                (index, invoker.invoke(&call).await)
            });
        }

        let mut slots: Vec<Option<ToolExecutionResult>> = vec![None; calls.len()];
        let deadline = tokio::time::sleep(self.config.batch_timeout);
        tokio::pin!(deadline);
        let mut timed_out = false;

        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    Some(Ok((index, result))) => slots[index] = Some(result),
                    Some(Err(e)) => log::warn!("Parallel tool task ended abnormally: {}", e),
                    None => break,
                },
                _ = &mut deadline => {
                    timed_out = true;
                    set.abort_all();
                    break;
                }
            }
        }

        let elapsed = started.elapsed().as_millis() as u64;
        slots
            .into_iter()
            .zip(calls)
            .map(|(slot, call)| {
                slot.unwrap_or_else(|| {
                    if timed_out {
                        ToolExecutionResult::failure(
                            call,
                            ErrorKind::BatchTimeout,
                            format!("Batch deadline of {}ms exceeded", self.config.batch_timeout.as_millis()),
                            elapsed,
                        )
                    } else {
                        ToolExecutionResult::failure(call, ErrorKind::Panicked, "Worker task aborted", elapsed)
                    }
                })
            })
            .collect()
    }

    async fn run_selective(&self, calls: &[ToolCall]) -> Vec<ToolExecutionResult> {
        let mut slots: Vec<Option<ToolExecutionResult>> = vec![None; calls.len()];
        let mut satisfied: Vec<&ToolCall> = Vec::new();

        for index in self.policy.order(calls) {
            let call = &calls[index];
            if let Some(reason) = self.policy.skip_reason(call, &satisfied) {
                log::info!("Skipping {}: {}", call.tool_name(), reason);
                slots[index] = Some(ToolExecutionResult::skipped(call, reason));
                continue;
            }
            let result = self.invoker.invoke(call).await;
            if result.is_success() {
                satisfied.push(call);
            }
            slots[index] = Some(result);
        }

        slots.into_iter().flatten().collect()
    }
}
