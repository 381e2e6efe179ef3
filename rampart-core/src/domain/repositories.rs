//! Repository interface for scans and findings

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::finding::Finding;
use super::scan::{Progress, Scan, ScanId, ScanStatus, Tool, UnsupportedScanType};

/// Persistence errors for scans and findings
#[derive(Debug, thiserror::Error)]
pub enum ScanRepositoryError {
    #[error("Scan not found: {0}")]
    NotFound(ScanId),

    #[error("Scan {id} already exists")]
    AlreadyExists { id: ScanId },

    #[error("Scan {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: ScanId,
        expected: ScanStatus,
        actual: ScanStatus,
    },

    #[error("Scan {0} is running and cannot be deleted")]
    ScanRunning(ScanId),

    #[error(transparent)]
    UnsupportedScanType(#[from] UnsupportedScanType),

    #[error("Corrupt row: {message}")]
    CorruptRow { message: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {message}")]
    Database { message: String },
}

/// Relational store holding scan and finding rows.
///
/// Every write is consistent on its own; no operation spans several rows of
/// different scans.
#[async_trait]
pub trait ScanRepository: Send + Sync {
    /// Insert a new scan row.
    async fn create_scan(&self, scan: &Scan) -> Result<(), ScanRepositoryError>;

    async fn find_scan(&self, id: ScanId) -> Result<Option<Scan>, ScanRepositoryError>;

    /// Persist status, timestamps and error message of `scan`, but only if the
    /// stored status still equals `expected`. Stored progress never decreases.
    async fn update_scan(
        &self,
        scan: &Scan,
        expected: ScanStatus,
    ) -> Result<(), ScanRepositoryError>;

    /// Raise the stored progress of a non-terminal scan and return the stored value.
    async fn record_progress(
        &self,
        id: ScanId,
        progress: Progress,
    ) -> Result<Progress, ScanRepositoryError>;

    /// Running scans whose claim marker is missing or older than `cutoff`.
    async fn find_stale_running(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Scan>, ScanRepositoryError>;

    /// Delete a scan and its findings. Running scans cannot be deleted.
    async fn delete_scan(&self, id: ScanId) -> Result<(), ScanRepositoryError>;

    /// Append one finding.
    async fn insert_finding(&self, finding: &Finding) -> Result<(), ScanRepositoryError>;

    /// Findings of a scan in persistence order.
    async fn list_findings(&self, scan_id: ScanId) -> Result<Vec<Finding>, ScanRepositoryError>;

    /// Tools whose stage of the scan has all its findings stored, in
    /// completion order.
    async fn completed_stages(&self, scan_id: ScanId) -> Result<Vec<Tool>, ScanRepositoryError>;

    /// Record that every finding `tool` reported for the scan is stored.
    /// Marking a stage twice is a no-op.
    async fn mark_stage_complete(
        &self,
        scan_id: ScanId,
        tool: Tool,
    ) -> Result<(), ScanRepositoryError>;

    /// Delete the findings `tool` stored for the scan and return how many
    /// were removed.
    async fn clear_stage_findings(
        &self,
        scan_id: ScanId,
        tool: Tool,
    ) -> Result<u64, ScanRepositoryError>;
}
