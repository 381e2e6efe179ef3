//! Inbound interface used by the submission layer

use std::sync::Arc;

use rampart_core::domain::{
    Finding, Scan, ScanId, ScanOptions, ScanRepository, ScanRepositoryError, ScanStatus, ScanType,
};
use tracing::info;

use super::workflow::{ScanWorkflow, WorkflowError};
use crate::domain::{JobId, JobOptions, JobPayload, JobStatusView};
use crate::infrastructure::job_queue::{JobQueue, JobQueueError};

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Scan not found: {0}")]
    ScanNotFound(ScanId),

    #[error("Scan {id} is {status}; only pending scans can be queued")]
    NotPending { id: ScanId, status: ScanStatus },

    #[error("Scan {0} already has a queued job")]
    AlreadyQueued(ScanId),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Queue(#[from] JobQueueError),

    #[error(transparent)]
    Repository(#[from] ScanRepositoryError),
}

/// Creates scans, enqueues their jobs and answers status queries.
#[derive(Clone)]
pub struct ScanJobService {
    repository: Arc<dyn ScanRepository>,
    queue: Arc<JobQueue>,
    workflow: ScanWorkflow,
}

impl ScanJobService {
    pub fn new(
        repository: Arc<dyn ScanRepository>,
        queue: Arc<JobQueue>,
        workflow: ScanWorkflow,
    ) -> Self {
        Self {
            repository,
            queue,
            workflow,
        }
    }

    /// Create a pending scan row and queue its job.
    pub async fn submit_scan(
        &self,
        scan: Scan,
        options: JobOptions,
    ) -> Result<(Scan, JobId), SubmissionError> {
        self.repository.create_scan(&scan).await?;
        let job_id = self
            .enqueue_scan_job_with(
                scan.id,
                scan.target.clone(),
                scan.scan_type,
                scan.options.clone(),
                options,
            )
            .await?;
        Ok((scan, job_id))
    }

    /// Queue a job for an existing pending scan. `None` uses the configured
    /// default priority.
    pub async fn enqueue_scan_job(
        &self,
        scan_id: ScanId,
        target: String,
        scan_type: ScanType,
        options: ScanOptions,
        priority: Option<i32>,
    ) -> Result<JobId, SubmissionError> {
        let priority = priority.unwrap_or(self.queue.settings().default_priority);
        self.enqueue_scan_job_with(
            scan_id,
            target,
            scan_type,
            options,
            JobOptions::default().with_priority(priority),
        )
        .await
    }

    pub async fn enqueue_scan_job_with(
        &self,
        scan_id: ScanId,
        target: String,
        scan_type: ScanType,
        options: ScanOptions,
        job_options: JobOptions,
    ) -> Result<JobId, SubmissionError> {
        let scan = self
            .repository
            .find_scan(scan_id)
            .await?
            .ok_or(SubmissionError::ScanNotFound(scan_id))?;
        if scan.status != ScanStatus::Pending {
            return Err(SubmissionError::NotPending {
                id: scan_id,
                status: scan.status,
            });
        }
        if self.queue.has_pending_job_for_scan(scan_id).await {
            return Err(SubmissionError::AlreadyQueued(scan_id));
        }

        let payload = JobPayload {
            scan_id,
            target,
            scan_type,
            options,
        };
        let job_id = self.queue.enqueue_with(payload, job_options).await?;
        info!(scan_id = %scan_id, job_id = %job_id, "Scan queued");
        Ok(job_id)
    }

    pub async fn get_job_status(&self, job_id: JobId) -> Option<JobStatusView> {
        self.queue.get_status(job_id).await
    }

    /// Job status for the latest retained job of a scan, including jobs
    /// persisted by another process.
    pub async fn find_scan_job_status(
        &self,
        scan_id: ScanId,
    ) -> Result<Option<JobStatusView>, SubmissionError> {
        Ok(self.queue.find_for_scan(scan_id).await?)
    }

    pub async fn find_scan(&self, scan_id: ScanId) -> Result<Option<Scan>, SubmissionError> {
        Ok(self.repository.find_scan(scan_id).await?)
    }

    pub async fn list_findings(&self, scan_id: ScanId) -> Result<Vec<Finding>, SubmissionError> {
        Ok(self.repository.list_findings(scan_id).await?)
    }

    /// Cancel a pending scan. A job still in the queue finishes as skipped.
    pub async fn cancel_scan(&self, scan_id: ScanId) -> Result<Scan, SubmissionError> {
        Ok(self.workflow.cancel_scan(scan_id).await?)
    }
}
