//! Scan workflow: the single place where scan status changes
//!
//! Every transition is validated against [`ScanStatus`], written with a
//! compare-and-set on the previous status, and logged.
//!
//! ```text
//! Worker              ScanWorkflow         ScanRepository
//!   │                      │                     │
//!   ├─ start_scan() ──────►│── update(Pending) ─►│
//!   │◄── Started ──────────┤                     │
//!   ├─ report_progress() ─►│── record_progress ─►│
//!   ├─ complete_scan() ───►│── update(Running) ─►│
//!   │◄── Scan(Complete) ───┤                     │
//! ```

use std::sync::Arc;

use chrono::Utc;
use rampart_core::domain::{
    Progress, Scan, ScanId, ScanRepository, ScanRepositoryError, ScanStatus, ScanTransitionError,
};
use tracing::{debug, info, warn};

/// Errors from the workflow layer.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid state transition: {0}")]
    InvalidTransition(#[from] ScanTransitionError),

    #[error("Scan not found: {0}")]
    NotFound(ScanId),

    #[error("Persistence error: {0}")]
    Repository(#[from] ScanRepositoryError),
}

/// Result of claiming a scan for execution
#[derive(Debug, Clone, PartialEq)]
pub enum ScanStart {
    /// Pending scan moved to running
    Started(Scan),
    /// Scan was already running (retried or recovered job); claim refreshed
    Resumed(Scan),
    /// Scan already finished or was cancelled; nothing to run
    Terminal(Scan),
}

/// Centralised scan lifecycle controller.
#[derive(Clone)]
pub struct ScanWorkflow {
    repository: Arc<dyn ScanRepository>,
}

impl ScanWorkflow {
    pub fn new(repository: Arc<dyn ScanRepository>) -> Self {
        Self { repository }
    }

    async fn load(&self, id: ScanId) -> Result<Scan, WorkflowError> {
        self.repository
            .find_scan(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    /// Claim a scan for execution. Safe to call again for a running scan.
    pub async fn start_scan(&self, id: ScanId) -> Result<ScanStart, WorkflowError> {
        let mut scan = self.load(id).await?;

        match scan.status {
            ScanStatus::Pending => {
                scan.transition(ScanStatus::Running)?;
                self.repository
                    .update_scan(&scan, ScanStatus::Pending)
                    .await?;
                info!(scan_id = %id, target = %scan.target, scan_type = %scan.scan_type, "Scan transitioned to Running");
                Ok(ScanStart::Started(scan))
            }
            ScanStatus::Running => {
                scan.claimed_at = Some(Utc::now());
                self.repository
                    .update_scan(&scan, ScanStatus::Running)
                    .await?;
                info!(scan_id = %id, "Resumed running scan");
                Ok(ScanStart::Resumed(scan))
            }
            ScanStatus::Complete | ScanStatus::Error | ScanStatus::Cancelled => {
                debug!(scan_id = %id, status = %scan.status, "Scan already terminal");
                Ok(ScanStart::Terminal(scan))
            }
        }
    }

    /// Persist a progress milestone; returns the stored value.
    pub async fn report_progress(
        &self,
        id: ScanId,
        progress: Progress,
    ) -> Result<Progress, WorkflowError> {
        let stored = self.repository.record_progress(id, progress).await?;
        debug!(scan_id = %id, progress = stored.value(), "Scan progress recorded");
        Ok(stored)
    }

    pub async fn complete_scan(&self, id: ScanId) -> Result<Scan, WorkflowError> {
        let mut scan = self.load(id).await?;
        scan.transition(ScanStatus::Complete)?;
        self.repository
            .update_scan(&scan, ScanStatus::Running)
            .await?;

        info!(scan_id = %id, "Scan transitioned to Complete");
        Ok(scan)
    }

    /// Move a scan to error with `message`. A scan that is already terminal
    /// is returned unchanged.
    pub async fn fail_scan(&self, id: ScanId, message: &str) -> Result<Scan, WorkflowError> {
        let mut scan = self.load(id).await?;
        if scan.is_terminal() {
            debug!(scan_id = %id, status = %scan.status, "Not failing terminal scan");
            return Ok(scan);
        }

        let previous = scan.status;
        scan.transition(ScanStatus::Error)?;
        scan.error_message = Some(message.to_string());
        self.repository.update_scan(&scan, previous).await?;

        warn!(scan_id = %id, error = message, "Scan transitioned to Error");
        Ok(scan)
    }

    /// Cancel a scan that has not started yet.
    pub async fn cancel_scan(&self, id: ScanId) -> Result<Scan, WorkflowError> {
        let mut scan = self.load(id).await?;
        scan.transition(ScanStatus::Cancelled)?;
        self.repository
            .update_scan(&scan, ScanStatus::Pending)
            .await?;

        info!(scan_id = %id, "Scan transitioned to Cancelled");
        Ok(scan)
    }
}
