//! Activity manager - runs one activity from INIT to a terminal state.
//!
//! Each iteration:
//! 1. Checks the iteration and wall-clock budgets
//! 2. Routes to recovery if the previous batch left failures, otherwise asks the reasoner
//! 3. Dispatches requested tools under the configured strategy
//! 4. Recovers immediately from any failures in that batch
//! 5. Evaluates the termination predicate
//!
//! Panics and errors inside an iteration are caught here; `run` always
//! returns an [`ActivityResult`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;

use super::events::{ActivityEvent, EventSender};
use super::state::LoopState;
use super::termination::{Never, TerminationPredicate};
use crate::backend::ReasoningBackend;
use crate::domain::{
    ActionDecision, ActivityResult, ActivityStatus, ConversationEntry, ConversationState, DecisionKind, ToolCall,
    ToolExecutionResult,
};
use crate::error::{AgentLoopError, Result};
use crate::history::{HistoryConfig, HistoryManager};
use crate::id::generate_activity_id;
use crate::reasoner::Reasoner;
use crate::recovery::{RecoveryModule, RecoveryPlan, exhausted_response};
use crate::tools::{
    Dispatcher, ExecutionConfig, ExecutionStrategy, SelectivePolicy, StrategyMode, ToolCatalog, ToolRegistry,
    panic_message,
};

/// Loop-level limits
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub max_iterations: u32,
    /// Wall-clock budget, checked at each iteration boundary
    pub timeout: Option<Duration>,
    pub strategy: StrategyMode,
    /// Consecutive recovery rounds allowed before giving up
    pub max_recovery_rounds: u32,
    /// Consecutive backend failures tolerated before giving up
    pub max_reasoning_failures: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            timeout: Some(Duration::from_secs(30)),
            strategy: StrategyMode::Auto,
            max_recovery_rounds: 3,
            max_reasoning_failures: 2,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AgentLoopError::Config("max_iterations must be at least 1".to_string()));
        }
        if self.max_reasoning_failures == 0 {
            return Err(AgentLoopError::Config(
                "max_reasoning_failures must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(AgentLoopError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// How a finished activity ended
struct Outcome {
    status: ActivityStatus,
    final_response: String,
    reason: Option<String>,
}

impl Outcome {
    fn new(status: ActivityStatus, final_response: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            status,
            final_response: final_response.into(),
            reason,
        }
    }

    fn failed(message: &str) -> Self {
        Self::new(
            ActivityStatus::Error,
            format!("Activity failed: {}", message),
            Some(format!("unhandled error: {}", message)),
        )
    }
}

enum Step {
    Continue,
    Finish(Outcome),
}

/// Builder for [`ActivityManager`]
pub struct ActivityManagerBuilder {
    backend: Arc<dyn ReasoningBackend>,
    registry: Arc<ToolRegistry>,
    config: ControllerConfig,
    execution: ExecutionConfig,
    selective: SelectivePolicy,
    history: HistoryConfig,
    termination: Box<dyn TerminationPredicate>,
    events: Option<EventSender>,
}

impl ActivityManagerBuilder {
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn strategy(mut self, strategy: StrategyMode) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn selective(mut self, policy: SelectivePolicy) -> Self {
        self.selective = policy;
        self
    }

    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    pub fn termination(mut self, predicate: impl TerminationPredicate + 'static) -> Self {
        self.termination = Box::new(predicate);
        self
    }

    /// Observe decisions, dispatches and completion as they happen
    pub fn events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn build(self) -> Result<ActivityManager> {
        self.config.validate()?;
        self.execution.validate()?;

        let history = HistoryManager::new(self.backend.clone(), self.history);
        Ok(ActivityManager {
            reasoner: Reasoner::new(self.backend.clone(), history.clone()),
            recovery: RecoveryModule::new(self.backend),
            dispatcher: Dispatcher::new(self.registry.clone(), self.execution, self.selective),
            history,
            registry: self.registry,
            config: self.config,
            termination: self.termination,
            events: self.events,
        })
    }
}

/// Owns the iteration state machine for activities
pub struct ActivityManager {
    config: ControllerConfig,
    registry: Arc<ToolRegistry>,
    reasoner: Reasoner,
    history: HistoryManager,
    recovery: RecoveryModule,
    dispatcher: Dispatcher,
    termination: Box<dyn TerminationPredicate>,
    events: Option<EventSender>,
}

impl ActivityManager {
    pub fn builder(backend: Arc<dyn ReasoningBackend>, registry: Arc<ToolRegistry>) -> ActivityManagerBuilder {
        ActivityManagerBuilder {
            backend,
            registry,
            config: ControllerConfig::default(),
            execution: ExecutionConfig::default(),
            selective: SelectivePolicy::default(),
            history: HistoryConfig::default(),
            termination: Box::new(Never),
            events: None,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one activity to completion
    pub async fn run(&self, user_query: &str, goal: Option<&str>) -> ActivityResult {
        let mut state = ConversationState::new(
            generate_activity_id(),
            user_query,
            goal.map(str::to_string),
            self.config.max_iterations,
        );
        let mut phase = LoopState::Init;

        tracing::info!(
            activity_id = %state.activity_id,
            max_iterations = state.max_iterations,
            "Activity started"
        );

        let outcome = loop {
            let step = AssertUnwindSafe(self.iterate(&mut state, &mut phase)).catch_unwind().await;
            match step {
                Ok(Ok(Step::Continue)) => continue,
                Ok(Ok(Step::Finish(outcome))) => break outcome,
                Ok(Err(e)) => {
                    tracing::error!(activity_id = %state.activity_id, error = %e, "Iteration failed");
                    break Outcome::failed(&e.to_string());
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(activity_id = %state.activity_id, panic = %message, "Iteration panicked");
                    break Outcome::failed(&message);
                }
            }
        };

        self.finish(state, phase, outcome)
    }

    /// Ask the reasoner for the next action without running it
    ///
    /// For callers that drive the loop themselves; `state` is not modified.
    pub async fn next_action(&self, state: &ConversationState) -> ActionDecision {
        let catalog = self.registry.snapshot();
        let started = Instant::now();
        match self.reasoner.decide(state, &catalog).await {
            Ok(validated) => ActionDecision::from_reasoning(
                &validated.output,
                state.iteration_count,
                state.max_iterations,
                elapsed_ms(started),
            ),
            Err(e) => ActionDecision::error_recovery(
                e.to_string(),
                e.is_retryable(),
                state.iteration_count,
                state.max_iterations,
                elapsed_ms(started),
            ),
        }
    }

    fn emit(&self, event: ActivityEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = tx.send(event);
        }
    }

    fn finish(&self, state: ConversationState, mut phase: LoopState, outcome: Outcome) -> ActivityResult {
        let target = LoopState::terminal_for(outcome.status);
        if phase != target
            && let Err(e) = phase.transition(target)
        {
            log::warn!("Finishing from unexpected state: {}", e);
        }

        let result = ActivityResult::from_state(&state, outcome.status, outcome.final_response, outcome.reason);
        tracing::info!(
            activity_id = %result.activity_id,
            status = %result.status,
            iterations = result.iterations,
            tool_calls = result.total_tool_calls,
            duration_ms = result.duration_ms,
            "Activity finished"
        );
        self.emit(ActivityEvent::Finished {
            activity_id: result.activity_id.clone(),
            status: result.status,
            iterations: result.iterations,
        });
        result
    }

    async fn iterate(&self, state: &mut ConversationState, phase: &mut LoopState) -> Result<Step> {
        if state.iteration_count >= state.max_iterations {
            return Ok(Step::Finish(Outcome::new(
                ActivityStatus::Timeout,
                format!("Activity reached maximum iterations ({}).", state.max_iterations),
                Some("iteration budget exhausted".to_string()),
            )));
        }
        if let Some(limit) = self.config.timeout
            && state.elapsed() >= limit
        {
            return Ok(Step::Finish(Outcome::new(
                ActivityStatus::Timeout,
                format!("Activity timed out after {:.1} seconds.", limit.as_secs_f64()),
                Some("wall-clock budget exhausted".to_string()),
            )));
        }

        state.iteration_count += 1;
        state.iteration_failures.clear();
        let catalog = self.registry.snapshot();

        tracing::info!(
            activity_id = %state.activity_id,
            iteration = state.iteration_count,
            from = %phase,
            "Iteration started"
        );
        self.emit(ActivityEvent::IterationStarted {
            activity_id: state.activity_id.clone(),
            iteration: state.iteration_count,
            state: *phase,
        });

        let step = if state.has_pending_failures() {
            phase.transition(LoopState::ErrorRecovery)?;
            self.recover(state, phase, &catalog).await?
        } else {
            phase.transition(LoopState::Reasoning)?;
            self.reason(state, phase, &catalog).await?
        };

        if let Step::Continue = step
            && let Some(reason) = self.termination.check(state)
        {
            tracing::warn!(activity_id = %state.activity_id, reason = %reason, "Termination predicate tripped");
            return Ok(Step::Finish(Outcome::new(
                ActivityStatus::Terminated,
                format!("Activity terminated: {}", reason),
                Some(reason),
            )));
        }
        Ok(step)
    }

    async fn reason(&self, state: &mut ConversationState, phase: &mut LoopState, catalog: &ToolCatalog) -> Result<Step> {
        let started = Instant::now();
        let (decision, issues) = match self.reasoner.decide(state, catalog).await {
            Ok(validated) => {
                state.reasoning_failures = 0;
                state.last_confidence = Some(validated.output.confidence);
                let decision = ActionDecision::from_reasoning(
                    &validated.output,
                    state.iteration_count,
                    state.max_iterations,
                    elapsed_ms(started),
                );
                (decision, validated.issues)
            }
            Err(e) => {
                state.reasoning_failures += 1;
                let retry = e.is_retryable() && state.reasoning_failures < self.config.max_reasoning_failures;
                tracing::warn!(
                    activity_id = %state.activity_id,
                    error = %e,
                    failures = state.reasoning_failures,
                    "Reasoning backend failed"
                );
                let decision = ActionDecision::error_recovery(
                    e.to_string(),
                    retry,
                    state.iteration_count,
                    state.max_iterations,
                    elapsed_ms(started),
                );
                (decision, Vec::new())
            }
        };

        tracing::info!(
            activity_id = %state.activity_id,
            iteration = state.iteration_count,
            action = decision.action_type(),
            confidence = decision.confidence(),
            "Decision"
        );
        self.emit(ActivityEvent::Decision {
            activity_id: state.activity_id.clone(),
            decision: decision.clone(),
            issues,
        });

        match decision.kind() {
            DecisionKind::ToolExecution {
                tool_suggestions,
                parallel_safe,
                final_response,
            } => {
                phase.transition(LoopState::ToolExecution)?;
                let strategy = self.config.strategy.resolve(*parallel_safe, tool_suggestions.len());
                let results = self.execute(state, strategy, tool_suggestions).await;

                let index = state.next_entry_index();
                let entry = ConversationEntry::new(index, decision.reasoning(), results.clone());
                self.history.append(&state.user_query, &mut state.history, entry).await;
                state.last_tool_results = Some(results);
                state.recovery_rounds = 0;

                if state.has_pending_failures() {
                    phase.transition(LoopState::ErrorRecovery)?;
                    return self.recover(state, phase, catalog).await;
                }
                // The reasoner stopped alongside this batch; answer now that it succeeded
                if let Some(final_response) = final_response {
                    phase.transition(LoopState::Final)?;
                    return Ok(Step::Finish(Outcome::new(ActivityStatus::Success, final_response.clone(), None)));
                }
                Ok(Step::Continue)
            }
            DecisionKind::FinalResponse { final_response } => {
                phase.transition(LoopState::Final)?;
                self.record_note(state, decision.reasoning(), Vec::new()).await;
                Ok(Step::Finish(Outcome::new(ActivityStatus::Success, final_response.clone(), None)))
            }
            DecisionKind::Continue { .. } => {
                self.record_note(state, decision.reasoning(), Vec::new()).await;
                Ok(Step::Continue)
            }
            DecisionKind::ErrorRecovery { error, should_continue } => {
                phase.transition(LoopState::ErrorRecovery)?;
                state.errors_encountered.push(format!("reasoner: {}", error));
                self.record_note(state, decision.reasoning(), vec![error.clone()]).await;
                if *should_continue {
                    return Ok(Step::Continue);
                }
                Ok(Step::Finish(Outcome::new(
                    ActivityStatus::ErrorRecoveryExhausted,
                    decision.reasoning(),
                    Some("reasoning backend unavailable".to_string()),
                )))
            }
        }
    }

    async fn recover(&self, state: &mut ConversationState, phase: &mut LoopState, catalog: &ToolCatalog) -> Result<Step> {
        let failures = state.failed_results();

        if state.recovery_rounds >= self.config.max_recovery_rounds {
            return Ok(Step::Finish(Outcome::new(
                ActivityStatus::ErrorRecoveryExhausted,
                exhausted_response(&state.user_query, &failures),
                Some(format!("{} recovery rounds did not resolve the failures", state.recovery_rounds)),
            )));
        }
        state.recovery_rounds += 1;

        let plan = self.recovery.plan(&failures, &state.user_query, catalog).await;
        let description = plan.describe();
        tracing::info!(
            activity_id = %state.activity_id,
            iteration = state.iteration_count,
            round = state.recovery_rounds,
            plan = %description,
            "Recovery planned"
        );
        self.emit(ActivityEvent::Recovery {
            activity_id: state.activity_id.clone(),
            iteration: state.iteration_count,
            plan: description.clone(),
        });

        let reasoning = format!("Recovery round {}: {}", state.recovery_rounds, description);
        match plan {
            RecoveryPlan::Dispatch { calls, skipped } => {
                phase.transition(LoopState::ToolExecution)?;
                // Recovery calls may depend on the failure they replace
                let results = self.execute(state, ExecutionStrategy::Sequential, &calls).await;

                let mut recorded = skipped.clone();
                recorded.extend(results.iter().cloned());
                let index = state.next_entry_index();
                let entry = ConversationEntry::new(index, reasoning, recorded);
                self.history.append(&state.user_query, &mut state.history, entry).await;

                let mut last = settled_results(state);
                last.extend(skipped);
                last.extend(results);
                state.last_tool_results = Some(last);
                if !state.has_pending_failures() {
                    state.recovery_rounds = 0;
                }
                Ok(Step::Continue)
            }
            RecoveryPlan::Proceed { skipped } => {
                let index = state.next_entry_index();
                let entry = ConversationEntry::new(index, reasoning, skipped.clone());
                self.history.append(&state.user_query, &mut state.history, entry).await;

                let mut last = settled_results(state);
                last.extend(skipped);
                state.last_tool_results = Some(last);
                state.recovery_rounds = 0;
                Ok(Step::Continue)
            }
            RecoveryPlan::Terminate { final_response, reason } => {
                Ok(Step::Finish(Outcome::new(ActivityStatus::ErrorRecoveryExhausted, final_response, Some(reason))))
            }
        }
    }

    async fn execute(
        &self,
        state: &mut ConversationState,
        strategy: ExecutionStrategy,
        calls: &[ToolCall],
    ) -> Vec<ToolExecutionResult> {
        let results = self.dispatcher.dispatch(strategy, calls).await;
        state.record_results(&results);

        let failed = results.iter().filter(|r| r.is_error()).count();
        let skipped = results.iter().filter(|r| r.is_skipped()).count();
        tracing::info!(
            activity_id = %state.activity_id,
            iteration = state.iteration_count,
            strategy = ?strategy,
            calls = results.len(),
            failed,
            skipped,
            "Tools dispatched"
        );
        self.emit(ActivityEvent::ToolsDispatched {
            activity_id: state.activity_id.clone(),
            iteration: state.iteration_count,
            strategy,
            results: results.clone(),
        });
        results
    }

    /// History entry for an iteration that dispatched nothing
    async fn record_note(&self, state: &mut ConversationState, reasoning: &str, errors: Vec<String>) {
        let index = state.next_entry_index();
        let entry = ConversationEntry::new(index, reasoning, Vec::new()).with_errors(errors);
        self.history.append(&state.user_query, &mut state.history, entry).await;
    }
}

/// Results of the last batch that are not failures
fn settled_results(state: &mut ConversationState) -> Vec<ToolExecutionResult> {
    state
        .last_tool_results
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|r| !r.is_error())
        .collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;
    use crate::domain::ReasoningOutput;
    use crate::llm::LlmError;
    use crate::tools::EchoTool;
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new().with_tool(EchoTool).unwrap())
    }

    fn manager(backend: ScriptedBackend) -> ActivityManager {
        ActivityManager::builder(Arc::new(backend), registry()).build().unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(ControllerConfig::default().validate().is_ok());
        let config = ControllerConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_rejects_bad_execution_config() {
        let result = ActivityManager::builder(Arc::new(ScriptedBackend::new()), registry())
            .execution(ExecutionConfig {
                pool_size: 0,
                ..Default::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_echo_then_finish() {
        let backend = ScriptedBackend::new()
            .then_decide(ReasoningOutput::use_tools(vec![ToolCall::from_json("echo", json!({"text": "hi"}))]))
            .then_decide(ReasoningOutput::finish("said hi"));

        let result = manager(backend).run("say hi", None).await;
        assert_eq!(result.status, ActivityStatus::Success);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.total_tool_calls, 1);
        assert_eq!(result.tools_used, vec!["echo"]);
        assert_eq!(result.history.len(), 2);
        assert_eq!(result.history[0].index, 1);
        assert_eq!(result.history[1].index, 2);
    }

    #[tokio::test]
    async fn test_backend_outage_exhausts_after_repeated_failures() {
        let backend = ScriptedBackend::new()
            .then_decide_err(LlmError::Unavailable("down".to_string()))
            .then_decide_err(LlmError::Unavailable("still down".to_string()));

        let result = manager(backend).run("q", None).await;
        assert_eq!(result.status, ActivityStatus::ErrorRecoveryExhausted);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.final_response, "I encountered an error: Backend unavailable: still down");
    }

    #[tokio::test]
    async fn test_non_retryable_backend_error_stops_at_once() {
        let backend = ScriptedBackend::new().then_decide_err(LlmError::MissingApiKey {
            env_var: "ANTHROPIC_API_KEY".to_string(),
        });

        let result = manager(backend).run("q", None).await;
        assert_eq!(result.status, ActivityStatus::ErrorRecoveryExhausted);
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn test_next_action_does_not_touch_state() {
        let backend = ScriptedBackend::new()
            .then_decide(ReasoningOutput::use_tools(vec![ToolCall::from_json("echo", json!({"text": "x"}))]));
        let manager = manager(backend);
        let state = ConversationState::new("act-x", "q", None, 5);

        let decision = manager.next_action(&state).await;
        assert_eq!(decision.action_type(), "tool_execution");
        assert_eq!(decision.iteration(), 0);
        assert!(state.history.is_empty());
    }

    #[tokio::test]
    async fn test_next_action_reports_backend_error() {
        let manager = manager(ScriptedBackend::new());
        let state = ConversationState::new("act-x", "q", None, 5);

        let decision = manager.next_action(&state).await;
        assert_eq!(decision.action_type(), "error_recovery");
        assert_eq!(
            decision.kind(),
            &DecisionKind::ErrorRecovery {
                error: "Backend unavailable: no scripted decide response left".to_string(),
                should_continue: true,
            }
        );
    }
}
