//! Scan repository implementations

pub mod memory;
pub mod sqlx_scan_repository;

pub use memory::InMemoryScanRepository;
pub use sqlx_scan_repository::SqlxScanRepository;
