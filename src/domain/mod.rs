//! Shared data model
//!
//! - ToolCall / ToolExecutionResult: one requested invocation and its outcome
//! - ReasoningOutput / ActionDecision: reasoner intent and its tagged projection
//! - ConversationEntry / ConversationState: per-activity history and counters
//! - ActivityResult: the terminal record of an activity

pub mod activity;
pub mod conversation;
pub mod reasoning;
pub mod tool_call;

pub use activity::{ActivityResult, ActivityStatus};
pub use conversation::{ConversationEntry, ConversationState, SUMMARY_INDEX};
pub use reasoning::{ActionDecision, DecisionKind, ReasoningOutput};
pub use tool_call::{ErrorKind, Parameters, ToolCall, ToolExecutionResult, ToolStatus};
