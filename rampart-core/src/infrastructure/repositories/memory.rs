//! In-memory scan repository for tests and ephemeral runs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::finding::Finding;
use crate::domain::repositories::{ScanRepository, ScanRepositoryError};
use crate::domain::scan::{Progress, Scan, ScanId, ScanStatus, Tool};

#[derive(Default)]
struct State {
    scans: HashMap<ScanId, Scan>,
    /// Insertion order doubles as persistence order
    findings: Vec<Finding>,
    stages: HashMap<ScanId, Vec<Tool>>,
}

/// [`ScanRepository`] holding rows in process memory
#[derive(Default)]
pub struct InMemoryScanRepository {
    state: RwLock<State>,
}

impl InMemoryScanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanRepository for InMemoryScanRepository {
    async fn create_scan(&self, scan: &Scan) -> Result<(), ScanRepositoryError> {
        let mut state = self.state.write().await;
        if state.scans.contains_key(&scan.id) {
            return Err(ScanRepositoryError::AlreadyExists { id: scan.id });
        }
        state.scans.insert(scan.id, scan.clone());
        Ok(())
    }

    async fn find_scan(&self, id: ScanId) -> Result<Option<Scan>, ScanRepositoryError> {
        Ok(self.state.read().await.scans.get(&id).cloned())
    }

    async fn update_scan(
        &self,
        scan: &Scan,
        expected: ScanStatus,
    ) -> Result<(), ScanRepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .scans
            .get_mut(&scan.id)
            .ok_or(ScanRepositoryError::NotFound(scan.id))?;

        if stored.status != expected {
            return Err(ScanRepositoryError::StatusConflict {
                id: scan.id,
                expected,
                actual: stored.status,
            });
        }

        stored.status = scan.status;
        stored.progress = stored.progress.max(scan.progress);
        stored.started_at = scan.started_at;
        stored.completed_at = scan.completed_at;
        stored.claimed_at = scan.claimed_at;
        stored.error_message = scan.error_message.clone();
        Ok(())
    }

    async fn record_progress(
        &self,
        id: ScanId,
        progress: Progress,
    ) -> Result<Progress, ScanRepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .scans
            .get_mut(&id)
            .ok_or(ScanRepositoryError::NotFound(id))?;
        Ok(stored.record_progress(progress))
    }

    async fn find_stale_running(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Scan>, ScanRepositoryError> {
        let state = self.state.read().await;
        let mut stale: Vec<Scan> = state
            .scans
            .values()
            .filter(|scan| scan.status == ScanStatus::Running)
            .filter(|scan| scan.claimed_at.is_none_or(|claimed| claimed < cutoff))
            .cloned()
            .collect();
        stale.sort_by_key(|scan| scan.created_at);
        Ok(stale)
    }

    async fn delete_scan(&self, id: ScanId) -> Result<(), ScanRepositoryError> {
        let mut state = self.state.write().await;
        match state.scans.get(&id) {
            None => return Err(ScanRepositoryError::NotFound(id)),
            Some(scan) if scan.status == ScanStatus::Running => {
                return Err(ScanRepositoryError::ScanRunning(id));
            }
            Some(_) => {}
        }
        state.scans.remove(&id);
        state.findings.retain(|finding| finding.scan_id != id);
        state.stages.remove(&id);
        Ok(())
    }

    async fn insert_finding(&self, finding: &Finding) -> Result<(), ScanRepositoryError> {
        let mut state = self.state.write().await;
        if !state.scans.contains_key(&finding.scan_id) {
            return Err(ScanRepositoryError::NotFound(finding.scan_id));
        }
        state.findings.push(finding.clone());
        Ok(())
    }

    async fn list_findings(&self, scan_id: ScanId) -> Result<Vec<Finding>, ScanRepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .findings
            .iter()
            .filter(|finding| finding.scan_id == scan_id)
            .cloned()
            .collect())
    }

    async fn completed_stages(&self, scan_id: ScanId) -> Result<Vec<Tool>, ScanRepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .stages
            .get(&scan_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_stage_complete(
        &self,
        scan_id: ScanId,
        tool: Tool,
    ) -> Result<(), ScanRepositoryError> {
        let mut state = self.state.write().await;
        if !state.scans.contains_key(&scan_id) {
            return Err(ScanRepositoryError::NotFound(scan_id));
        }
        let stages = state.stages.entry(scan_id).or_default();
        if !stages.contains(&tool) {
            stages.push(tool);
        }
        Ok(())
    }

    async fn clear_stage_findings(
        &self,
        scan_id: ScanId,
        tool: Tool,
    ) -> Result<u64, ScanRepositoryError> {
        let mut state = self.state.write().await;
        let before = state.findings.len();
        state
            .findings
            .retain(|finding| finding.scan_id != scan_id || finding.tool != tool);
        Ok((before - state.findings.len()) as u64)
    }
}
