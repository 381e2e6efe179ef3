//! Rampart Orchestrator - Job queue, worker pool and scan execution
//!
//! A scan moves through the engine as a job:
//!
//! ```text
//! submission ──► JobQueue ──► worker pool ──► ScanExecutor ──► adapters
//!                   ▲                              │
//!                   │                              ├──► classify ──► ScanRepository
//!                   └──── complete / fail ◄────────┘
//! ```
//!
//! [`ScanWorkflow`] owns every scan status transition. The [`JobQueue`]
//! retries failed jobs with exponential backoff and writes each job
//! transition through a [`JobStore`] so waiting work survives a restart.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::executor::{ExecutionError, ScanExecutor, ScanOutcome};
pub use application::reconciliation::{ReconciliationError, ReconciliationSweep};
pub use application::submission::{ScanJobService, SubmissionError};
pub use application::workflow::{ScanStart, ScanWorkflow, WorkflowError};
pub use domain::{
    Job, JobCounts, JobId, JobOptions, JobPayload, JobState, JobStatusView, JobTransitionError,
};
pub use infrastructure::job_queue::{FailureOutcome, JobQueue, JobQueueError, JobQueueSettings};
pub use infrastructure::job_store::{InMemoryJobStore, JobStore, JobStoreError, SqlxJobStore};
pub use infrastructure::worker::{JobProcessingError, JobWorkerContext, spawn_job_worker_pool};
