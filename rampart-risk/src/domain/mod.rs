//! Scoring rules and lookup tables

pub mod profiles;
pub mod tables;
