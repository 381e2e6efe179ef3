//! Job domain model

pub mod entities;
pub mod value_objects;

pub use entities::{Job, JobCounts, JobOptions, JobPayload, JobStatusView};
pub use value_objects::{JobId, JobState, JobTransitionError};
