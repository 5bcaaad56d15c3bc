//! Loop controller
//!
//! The [`ActivityManager`] drives the iteration state machine; the reasoner
//! only ever proposes, the controller decides and executes.

mod events;
mod manager;
mod state;
mod termination;

pub use events::{ActivityEvent, EventSender};
pub use manager::{ActivityManager, ActivityManagerBuilder, ControllerConfig};
pub use state::LoopState;
pub use termination::{AnyOf, CriticalToolFailure, ErrorBudget, LowConfidence, Never, TerminationPredicate};
