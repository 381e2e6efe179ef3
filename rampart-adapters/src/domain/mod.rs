//! Adapter contract

pub mod traits;

pub use traits::{AdapterError, AdapterRun, ToolAdapter};
