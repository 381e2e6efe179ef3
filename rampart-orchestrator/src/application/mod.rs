//! Orchestrator use cases

pub mod executor;
pub mod reconciliation;
pub mod submission;
pub mod workflow;
