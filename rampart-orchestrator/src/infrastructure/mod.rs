//! Queue, persistence and background workers

pub mod job_queue;
pub mod job_store;
pub mod worker;
