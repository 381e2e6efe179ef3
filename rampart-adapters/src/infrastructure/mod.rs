//! Process execution, parsers and concrete adapters

pub mod adapters;
pub mod fallback;
pub mod parsers;
pub mod process;
