//! Controller state machine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::ActivityStatus;
use crate::error::{AgentLoopError, Result};

/// Where an activity is in its iteration cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Init,
    Reasoning,
    ToolExecution,
    ErrorRecovery,
    Final,
    Timeout,
    Terminated,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Init => "init",
            LoopState::Reasoning => "reasoning",
            LoopState::ToolExecution => "tool_execution",
            LoopState::ErrorRecovery => "error_recovery",
            LoopState::Final => "final",
            LoopState::Timeout => "timeout",
            LoopState::Terminated => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Final | LoopState::Timeout | LoopState::Terminated)
    }

    /// Terminal state an activity status ends in
    pub fn terminal_for(status: ActivityStatus) -> Self {
        match status {
            ActivityStatus::Success => LoopState::Final,
            ActivityStatus::Timeout => LoopState::Timeout,
            ActivityStatus::Terminated | ActivityStatus::ErrorRecoveryExhausted | ActivityStatus::Error => {
                LoopState::Terminated
            }
        }
    }

    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Timeout | Terminated) {
            return true;
        }
        match self {
            Init => next == Reasoning,
            Reasoning => matches!(next, Reasoning | ToolExecution | ErrorRecovery | Final),
            ToolExecution => matches!(next, Reasoning | ErrorRecovery | Final),
            ErrorRecovery => matches!(next, Reasoning | ToolExecution | ErrorRecovery),
            Final | Timeout | Terminated => false,
        }
    }

    /// Move to `next`, rejecting illegal edges
    pub fn transition(&mut self, next: LoopState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(AgentLoopError::InvalidState(format!("{} -> {}", self, next)));
        }
        log::trace!("Loop state {} -> {}", self, next);
        *self = next;
        Ok(())
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
