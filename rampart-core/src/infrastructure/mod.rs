//! Infrastructure layer

pub mod database;
pub mod repositories;

pub use database::{Database, DatabaseError};
pub use repositories::{InMemoryScanRepository, SqlxScanRepository};
