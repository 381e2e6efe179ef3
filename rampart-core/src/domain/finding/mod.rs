//! Findings: raw tool output and its normalized, scored form

pub mod entities;
pub mod value_objects;

pub use entities::*;
pub use value_objects::*;
