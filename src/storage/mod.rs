//! Persistence for finished activities
//!
//! Only terminal [`crate::domain::ActivityResult`] records are stored; nothing
//! about a running activity outlives it.

mod jsonl;

pub use jsonl::ActivityLog;
