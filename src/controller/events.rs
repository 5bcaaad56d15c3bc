//! Observable activity events

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::state::LoopState;
use crate::domain::{ActionDecision, ActivityStatus, ToolExecutionResult};
use crate::reasoner::ValidationIssue;
use crate::tools::ExecutionStrategy;

/// Sender half handed to [`super::ActivityManagerBuilder::events`]
pub type EventSender = mpsc::UnboundedSender<ActivityEvent>;

/// Emitted by the controller as an activity progresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActivityEvent {
    IterationStarted {
        activity_id: String,
        iteration: u32,
        state: LoopState,
    },
    Decision {
        activity_id: String,
        decision: ActionDecision,
        #[serde(default)]
        issues: Vec<ValidationIssue>,
    },
    ToolsDispatched {
        activity_id: String,
        iteration: u32,
        strategy: ExecutionStrategy,
        results: Vec<ToolExecutionResult>,
    },
    Recovery {
        activity_id: String,
        iteration: u32,
        plan: String,
    },
    Finished {
        activity_id: String,
        status: ActivityStatus,
        iterations: u32,
    },
}

impl ActivityEvent {
    pub fn activity_id(&self) -> &str {
        match self {
            Self::IterationStarted { activity_id, .. }
            | Self::Decision { activity_id, .. }
            | Self::ToolsDispatched { activity_id, .. }
            | Self::Recovery { activity_id, .. }
            | Self::Finished { activity_id, .. } => activity_id,
        }
    }
}
