//! Adapter selection

pub mod registry;
