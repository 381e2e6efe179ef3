use std::collections::HashMap;

use async_trait::async_trait;
use rampart_core::domain::ScanId;
use tokio::sync::RwLock;

use crate::domain::{Job, JobId};

/// Job persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Corrupt job record {id}: {message}")]
    CorruptRecord { id: String, message: String },
}

/// Job storage interface.
///
/// The queue writes every state change through this store; on startup it
/// reloads whatever has not finished.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace the record for `job.id`.
    async fn save_job(&self, job: &Job) -> Result<(), JobStoreError>;
    async fn delete_job(&self, id: JobId) -> Result<(), JobStoreError>;
    /// Jobs in the waiting or active state, in enqueue order.
    async fn load_unfinished(&self) -> Result<Vec<Job>, JobStoreError>;
    /// Retained jobs of one scan in any state, in enqueue order.
    async fn load_for_scan(&self, scan_id: ScanId) -> Result<Vec<Job>, JobStoreError>;
}

/// Process-local job store; nothing survives a restart.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), JobStoreError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn delete_job(&self, id: JobId) -> Result<(), JobStoreError> {
        self.jobs.write().await.remove(&id);
        Ok(())
    }

    async fn load_unfinished(&self) -> Result<Vec<Job>, JobStoreError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| !job.state.is_terminal())
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.seq);
        Ok(jobs)
    }

    async fn load_for_scan(&self, scan_id: ScanId) -> Result<Vec<Job>, JobStoreError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.payload.scan_id == scan_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.seq);
        Ok(jobs)
    }
}
