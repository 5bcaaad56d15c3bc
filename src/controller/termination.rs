//! Pluggable early-termination rules
//!
//! Checked after every iteration that did not already end the activity.
//! A predicate returns the reason it tripped, or `None`.

use crate::domain::ConversationState;

pub trait TerminationPredicate: Send + Sync {
    fn check(&self, state: &ConversationState) -> Option<String>;
}

impl<F> TerminationPredicate for F
where
    F: Fn(&ConversationState) -> Option<String> + Send + Sync,
{
    fn check(&self, state: &ConversationState) -> Option<String> {
        self(state)
    }
}

/// Never trips
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl TerminationPredicate for Never {
    fn check(&self, _state: &ConversationState) -> Option<String> {
        None
    }
}

/// Trips when the last reasoner confidence falls below `threshold`
#[derive(Debug, Clone, Copy)]
pub struct LowConfidence {
    pub threshold: f64,
}

impl TerminationPredicate for LowConfidence {
    fn check(&self, state: &ConversationState) -> Option<String> {
        let confidence = state.last_confidence?;
        (confidence < self.threshold)
            .then(|| format!("confidence {:.2} below threshold {:.2}", confidence, self.threshold))
    }
}

/// Trips once more than `max_errors` errors have accumulated
#[derive(Debug, Clone, Copy)]
pub struct ErrorBudget {
    pub max_errors: usize,
}

impl TerminationPredicate for ErrorBudget {
    fn check(&self, state: &ConversationState) -> Option<String> {
        let count = state.errors_encountered.len();
        (count > self.max_errors).then(|| format!("{} errors exceed the budget of {}", count, self.max_errors))
    }
}

/// Trips when a designated tool failed during the current iteration
#[derive(Debug, Clone, Default)]
pub struct CriticalToolFailure {
    pub tools: Vec<String>,
}

impl CriticalToolFailure {
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
        }
    }
}

impl TerminationPredicate for CriticalToolFailure {
    fn check(&self, state: &ConversationState) -> Option<String> {
        state
            .iteration_failures
            .iter()
            .find(|failed| self.tools.contains(failed))
            .map(|tool| format!("critical tool {} failed", tool))
    }
}

/// First tripping member wins
#[derive(Default)]
pub struct AnyOf(pub Vec<Box<dyn TerminationPredicate>>);

impl AnyOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: impl TerminationPredicate + 'static) -> Self {
        self.0.push(Box::new(predicate));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TerminationPredicate for AnyOf {
    fn check(&self, state: &ConversationState) -> Option<String> {
        self.0.iter().find_map(|p| p.check(state))
    }
}
