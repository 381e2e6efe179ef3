//! Domain layer shared by every Rampart crate

pub mod finding;
pub mod repositories;
pub mod scan;

pub use finding::*;
pub use repositories::{ScanRepository, ScanRepositoryError};
pub use scan::*;
