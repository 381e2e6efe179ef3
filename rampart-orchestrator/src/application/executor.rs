//! Scan execution: adapters, classification and persistence for one job

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use rampart_adapters::{AdapterError, AdapterRegistry, ToolAdapter};
use rampart_core::domain::{
    Finding, Progress, RawFinding, RiskLevel, ScanId, ScanRepository, ScanRepositoryError,
    ScanType, Tool,
};
use rampart_risk::{Classification, classify};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::workflow::{ScanStart, ScanWorkflow, WorkflowError};
use crate::domain::JobPayload;

/// Errors that end a scan attempt and go back to the job queue.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("{tool} failed: {source}")]
    Adapter {
        tool: Tool,
        #[source]
        source: AdapterError,
    },

    #[error("Persistence error: {0}")]
    Repository(#[from] ScanRepositoryError),

    #[error("No adapter registered for scan type {0}")]
    AdapterUnavailable(ScanType),
}

/// Summary of one executed scan, stored as the job result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub scan_id: ScanId,
    /// Findings stored for the scan, including those kept from stages an
    /// earlier attempt completed
    pub findings_persisted: usize,
    pub by_risk_level: BTreeMap<RiskLevel, usize>,
    /// Tools that ran in this attempt, in execution order
    pub adapters_run: Vec<Tool>,
    /// Tools whose results stand in for output they failed to produce
    pub adapters_fell_back: Vec<Tool>,
    /// Tools not run again because an earlier attempt stored their findings
    #[serde(default)]
    pub stages_resumed: Vec<Tool>,
    /// The scan was already terminal; no adapter ran
    pub skipped: bool,
}

impl ScanOutcome {
    fn new(scan_id: ScanId) -> Self {
        Self {
            scan_id,
            findings_persisted: 0,
            by_risk_level: BTreeMap::new(),
            adapters_run: Vec::new(),
            adapters_fell_back: Vec::new(),
            stages_resumed: Vec::new(),
            skipped: false,
        }
    }

    pub fn skipped(scan_id: ScanId) -> Self {
        Self {
            skipped: true,
            ..Self::new(scan_id)
        }
    }

    pub fn count(&self, level: RiskLevel) -> usize {
        self.by_risk_level.get(&level).copied().unwrap_or(0)
    }
}

/// Runs the adapters of one scan and persists classified findings.
pub struct ScanExecutor {
    registry: Arc<AdapterRegistry>,
    repository: Arc<dyn ScanRepository>,
    workflow: ScanWorkflow,
    classification_concurrency: usize,
}

impl ScanExecutor {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        repository: Arc<dyn ScanRepository>,
        workflow: ScanWorkflow,
        classification_concurrency: usize,
    ) -> Self {
        Self {
            registry,
            repository,
            workflow,
            classification_concurrency: classification_concurrency.max(1),
        }
    }

    /// Execute the scan described by `payload`.
    ///
    /// With `n` adapters, progress moves in steps of `100 / (n + 2)`: one
    /// step once the scan is running, one after each adapter, then 100 on
    /// completion. Every recorded milestone is also sent on `progress`.
    ///
    /// Each adapter is one stage. A stage whose findings an earlier attempt
    /// fully stored is not run again, so a retried job never duplicates
    /// findings.
    pub async fn execute(
        &self,
        payload: &JobPayload,
        progress: &mpsc::UnboundedSender<Progress>,
    ) -> Result<ScanOutcome, ExecutionError> {
        let scan_id = payload.scan_id;

        let scan = match self.workflow.start_scan(scan_id).await? {
            ScanStart::Started(scan) | ScanStart::Resumed(scan) => scan,
            ScanStart::Terminal(scan) => {
                info!(scan_id = %scan_id, status = %scan.status, "Skipping terminal scan");
                return Ok(ScanOutcome::skipped(scan_id));
            }
        };

        let adapters = self
            .registry
            .resolve(payload.scan_type)
            .ok_or(ExecutionError::AdapterUnavailable(payload.scan_type))?;

        let step = 100 / (adapters.len() + 2) as u8;
        self.milestone(scan_id, Progress::new(step), progress)
            .await?;

        let mut outcome = ScanOutcome::new(scan_id);
        let completed = self.repository.completed_stages(scan_id).await?;
        if !completed.is_empty() {
            self.count_stored(scan_id, &completed, &mut outcome).await?;
        }

        for (index, adapter) in adapters.iter().enumerate() {
            let tool = adapter.tool();
            if completed.contains(&tool) {
                info!(
                    scan_id = %scan_id,
                    tool = %tool,
                    "Stage already complete, not running adapter"
                );
                outcome.stages_resumed.push(tool);
            } else {
                self.run_adapter(adapter.as_ref(), payload, &mut outcome)
                    .await?;
            }
            let reached = step.saturating_mul(index as u8 + 2);
            self.milestone(scan_id, Progress::new(reached), progress)
                .await?;
        }

        self.workflow.complete_scan(scan.id).await?;
        if progress.send(Progress::COMPLETE).is_err() {
            debug!(scan_id = %scan_id, "Progress receiver dropped");
        }

        info!(
            scan_id = %scan_id,
            findings = outcome.findings_persisted,
            fell_back = outcome.adapters_fell_back.len(),
            "Scan completed"
        );
        Ok(outcome)
    }

    async fn milestone(
        &self,
        scan_id: ScanId,
        value: Progress,
        progress: &mpsc::UnboundedSender<Progress>,
    ) -> Result<(), ExecutionError> {
        let stored = self.workflow.report_progress(scan_id, value).await?;
        if progress.send(stored).is_err() {
            debug!(scan_id = %scan_id, "Progress receiver dropped");
        }
        Ok(())
    }

    async fn run_adapter(
        &self,
        adapter: &dyn ToolAdapter,
        payload: &JobPayload,
        outcome: &mut ScanOutcome,
    ) -> Result<(), ExecutionError> {
        let tool = adapter.tool();
        info!(scan_id = %payload.scan_id, tool = %tool, target = %payload.target, "Running adapter");

        let run = adapter
            .execute(&payload.target, &payload.options)
            .await
            .map_err(|source| ExecutionError::Adapter { tool, source })?;

        outcome.adapters_run.push(tool);
        if run.fell_back {
            warn!(scan_id = %payload.scan_id, tool = %tool, "Adapter fell back");
            outcome.adapters_fell_back.push(tool);
        }

        // Rows left by an attempt that failed while storing this stage
        let cleared = self
            .repository
            .clear_stage_findings(payload.scan_id, tool)
            .await?;
        if cleared > 0 {
            warn!(
                scan_id = %payload.scan_id,
                tool = %tool,
                cleared,
                "Replacing findings of an unfinished stage"
            );
        }

        let persisted = self
            .persist_findings(payload.scan_id, tool, run.findings, outcome)
            .await?;
        self.repository
            .mark_stage_complete(payload.scan_id, tool)
            .await?;
        debug!(scan_id = %payload.scan_id, tool = %tool, persisted, "Adapter findings stored");
        Ok(())
    }

    /// Count findings kept from completed stages into `outcome`.
    async fn count_stored(
        &self,
        scan_id: ScanId,
        completed: &[Tool],
        outcome: &mut ScanOutcome,
    ) -> Result<(), ExecutionError> {
        let stored = self.repository.list_findings(scan_id).await?;
        for finding in stored.iter().filter(|f| completed.contains(&f.tool)) {
            *outcome.by_risk_level.entry(finding.risk_level).or_default() += 1;
            outcome.findings_persisted += 1;
        }
        Ok(())
    }

    /// Classify and store findings concurrently; each one is written as soon
    /// as its classification is ready.
    async fn persist_findings(
        &self,
        scan_id: ScanId,
        tool: Tool,
        raw_findings: Vec<RawFinding>,
        outcome: &mut ScanOutcome,
    ) -> Result<usize, ExecutionError> {
        let repository = &self.repository;
        let mut stored = stream::iter(raw_findings)
            .map(|raw| async move {
                let classification = classify(&raw);
                let finding = build_finding(scan_id, tool, raw, &classification);
                repository.insert_finding(&finding).await?;
                Ok::<_, ScanRepositoryError>(finding.risk_level)
            })
            .buffer_unordered(self.classification_concurrency);

        let mut persisted = 0;
        while let Some(result) = stored.next().await {
            let level = result?;
            *outcome.by_risk_level.entry(level).or_default() += 1;
            outcome.findings_persisted += 1;
            persisted += 1;
        }
        Ok(persisted)
    }
}

fn build_finding(
    scan_id: ScanId,
    tool: Tool,
    raw: RawFinding,
    classification: &Classification,
) -> Finding {
    Finding {
        id: Uuid::new_v4(),
        scan_id,
        tool,
        vulnerability_type: raw.vulnerability_type,
        risk_level: classification.risk_level,
        title: classification.title.clone(),
        description: classification.description.clone(),
        fix_suggestion: classification.fix_suggestion_text(),
        score: classification.score,
        cve_id: raw.cve_id,
        affected_component: raw.affected_component,
        port: raw.port,
        service: raw.service,
        raw_output: raw.raw_output,
        classification_metadata: classification.metadata(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_carries_classification() {
        let raw = RawFinding::new("open_port", "Open port 22/tcp (ssh)")
            .with_port(22)
            .with_service("ssh");
        let classification = classify(&raw);
        let finding = build_finding(ScanId::generate(), Tool::PortScanner, raw, &classification);

        assert_eq!(finding.tool, Tool::PortScanner);
        assert_eq!(finding.risk_level, RiskLevel::Medium);
        assert_eq!(finding.score, 6.4);
        assert_eq!(finding.port, Some(22));
        assert_eq!(finding.classification_metadata["profile"], classification.profile);
    }

    #[test]
    fn test_outcome_serializes_level_counts() {
        let mut outcome = ScanOutcome::new(ScanId::generate());
        outcome.by_risk_level.insert(RiskLevel::Medium, 1);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["by_risk_level"]["medium"], 1);
        assert_eq!(outcome.count(RiskLevel::High), 0);

        // Results stored before stage tracking existed still decode
        let mut legacy = json;
        legacy.as_object_mut().unwrap().remove("stages_resumed");
        let decoded: ScanOutcome = serde_json::from_value(legacy).unwrap();
        assert_eq!(decoded, outcome);
    }
}
