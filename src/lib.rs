//! agentloop - a controllable decision loop for tool-using LLM agents
//!
//! A reasoning backend proposes structured intent (continue or stop, which
//! tools, with what arguments). The [`controller::ActivityManager`] owns the
//! iteration state machine: it dispatches tools under a sequential, parallel
//! or selective strategy, folds failures into recovery rounds, compresses
//! history, and always hands the caller a well-formed [`domain::ActivityResult`].
//! The reasoning side never invokes a tool itself.

pub mod backend;
pub mod controller;
pub mod domain;
pub mod error;
pub mod history;
pub mod id;
pub mod llm;
pub mod reasoner;
pub mod recovery;
pub mod storage;
pub mod tools;

pub use error::{AgentLoopError, Result};
