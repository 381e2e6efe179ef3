//! Shared helpers for rampart-orchestrator integration tests

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;
