//! Scan domain: the unit of work submitted against one target

pub mod entities;
pub mod value_objects;

pub use entities::*;
pub use value_objects::*;
