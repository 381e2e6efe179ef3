//! Recovery of scans left in RUNNING without a job to drive them

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rampart_core::domain::{ScanRepository, ScanRepositoryError};
use tracing::{debug, info};

use crate::domain::JobPayload;
use crate::infrastructure::job_queue::{JobQueue, JobQueueError};

#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error(transparent)]
    Repository(#[from] ScanRepositoryError),

    #[error(transparent)]
    Queue(#[from] JobQueueError),
}

/// Re-enqueues running scans whose claim is stale and that have no waiting
/// or active job.
pub struct ReconciliationSweep {
    repository: Arc<dyn ScanRepository>,
    queue: Arc<JobQueue>,
    stale_after: Duration,
}

impl ReconciliationSweep {
    pub fn new(
        repository: Arc<dyn ScanRepository>,
        queue: Arc<JobQueue>,
        stale_after: Duration,
    ) -> Self {
        Self {
            repository,
            queue,
            stale_after,
        }
    }

    /// One pass; returns how many scans were re-enqueued.
    pub async fn run_once(&self) -> Result<usize, ReconciliationError> {
        let cutoff = chrono::Duration::from_std(self.stale_after)
            .ok()
            .and_then(|stale_after| Utc::now().checked_sub_signed(stale_after))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let stale = self.repository.find_stale_running(cutoff).await?;
        let mut requeued = 0;
        for scan in stale {
            if self.queue.has_pending_job_for_scan(scan.id).await {
                debug!(scan_id = %scan.id, "Stale scan still has a queued job");
                continue;
            }

            let payload = JobPayload {
                scan_id: scan.id,
                target: scan.target.clone(),
                scan_type: scan.scan_type,
                options: scan.options.clone(),
            };
            let job_id = self.queue.enqueue(payload).await?;
            info!(
                scan_id = %scan.id,
                job_id = %job_id,
                claimed_at = ?scan.claimed_at,
                "Re-enqueued stale running scan"
            );
            requeued += 1;
        }
        Ok(requeued)
    }
}
