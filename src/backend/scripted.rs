//! Deterministic in-process backend
//!
//! Replays queued typed answers per request kind and records every request,
//! which makes whole activities reproducible in tests and demos.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{BackendRequest, BackendResponse, DecisionRequest, HistorySummary, ReasoningBackend};
use crate::domain::ReasoningOutput;
use crate::llm::LlmError;
use crate::recovery::RecoveryStrategy;

type Queue<T> = Mutex<VecDeque<Result<T, LlmError>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
pub struct ScriptedBackend {
    decisions: Queue<ReasoningOutput>,
    summaries: Queue<HistorySummary>,
    recoveries: Queue<RecoveryStrategy>,
    default_decision: Option<ReasoningOutput>,
    requests: Mutex<Vec<BackendRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next decision
    pub fn then_decide(self, output: ReasoningOutput) -> Self {
        lock(&self.decisions).push_back(Ok(output));
        self
    }

    /// Queue a failing decision call
    pub fn then_decide_err(self, err: LlmError) -> Self {
        lock(&self.decisions).push_back(Err(err));
        self
    }

    pub fn then_summarize(self, summary: HistorySummary) -> Self {
        lock(&self.summaries).push_back(Ok(summary));
        self
    }

    pub fn then_summarize_err(self, err: LlmError) -> Self {
        lock(&self.summaries).push_back(Err(err));
        self
    }

    pub fn then_recover(self, strategy: RecoveryStrategy) -> Self {
        lock(&self.recoveries).push_back(Ok(strategy));
        self
    }

    pub fn then_recover_err(self, err: LlmError) -> Self {
        lock(&self.recoveries).push_back(Err(err));
        self
    }

    /// Answer used once the decision queue is empty
    pub fn with_default_decision(mut self, output: ReasoningOutput) -> Self {
        self.default_decision = Some(output);
        self
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<BackendRequest> {
        lock(&self.requests).clone()
    }

    pub fn decision_requests(&self) -> Vec<DecisionRequest> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                BackendRequest::Decide(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.kind() == kind).count()
    }

    fn exhausted(kind: &str) -> LlmError {
        LlmError::Unavailable(format!("no scripted {} response left", kind))
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn request(&self, request: BackendRequest) -> Result<BackendResponse, LlmError> {
        let kind = request.kind();
        lock(&self.requests).push(request.clone());

        match request {
            BackendRequest::Decide(_) => {
                let next = lock(&self.decisions).pop_front();
                match next {
                    Some(answer) => answer.map(BackendResponse::Decision),
                    None => self
                        .default_decision
                        .clone()
                        .map(BackendResponse::Decision)
                        .ok_or_else(|| Self::exhausted(kind)),
                }
            }
            BackendRequest::Summarize(_) => {
                let next = lock(&self.summaries).pop_front();
                next.ok_or_else(|| Self::exhausted(kind))?.map(BackendResponse::Summary)
            }
            BackendRequest::Recover(_) => {
                let next = lock(&self.recoveries).pop_front();
                next.ok_or_else(|| Self::exhausted(kind))?.map(BackendResponse::Recovery)
            }
        }
    }
}
