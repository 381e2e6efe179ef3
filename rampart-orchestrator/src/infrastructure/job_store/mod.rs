//! Durable storage for queue records

mod sqlx_store;
mod store;

pub use sqlx_store::SqlxJobStore;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
