//! SQLx implementation of the scan repository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::finding::{Finding, RiskLevel};
use crate::domain::repositories::{ScanRepository, ScanRepositoryError};
use crate::domain::scan::{Progress, Scan, ScanId, ScanOptions, ScanStatus, ScanType, Tool};

const SCAN_COLUMNS: &str = "id, user_id, target, scan_type, status, progress, options, \
     created_at, started_at, completed_at, claimed_at, error_message";

const FINDING_COLUMNS: &str = "id, scan_id, tool, vulnerability_type, risk_level, title, description, \
     fix_suggestion, score, cve_id, affected_component, port, service, raw_output, \
     classification_metadata, created_at";

/// SQLx implementation of [`ScanRepository`] backed by SQLite
pub struct SqlxScanRepository {
    pool: Arc<SqlitePool>,
}

impl SqlxScanRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> ScanRepositoryError {
    tracing::error!("Database error {}: {}", context, e);
    ScanRepositoryError::Database {
        message: e.to_string(),
    }
}

fn corrupt(message: impl Into<String>) -> ScanRepositoryError {
    ScanRepositoryError::CorruptRow {
        message: message.into(),
    }
}

fn scan_from_row(row: &SqliteRow) -> Result<Scan, ScanRepositoryError> {
    let read = |e: sqlx::Error| corrupt(e.to_string());

    let id: String = row.try_get("id").map_err(read)?;
    let scan_type: String = row.try_get("scan_type").map_err(read)?;
    let status: String = row.try_get("status").map_err(read)?;
    let progress: i64 = row.try_get("progress").map_err(read)?;
    let options: String = row.try_get("options").map_err(read)?;

    Ok(Scan {
        id: id
            .parse::<ScanId>()
            .map_err(|e| corrupt(format!("scan id {}: {}", id, e)))?,
        user_id: row.try_get("user_id").map_err(read)?,
        target: row.try_get("target").map_err(read)?,
        scan_type: scan_type.parse::<ScanType>()?,
        status: status.parse::<ScanStatus>().map_err(corrupt)?,
        progress: Progress::new(progress.clamp(0, 100) as u8),
        options: serde_json::from_str::<ScanOptions>(&options)?,
        created_at: row.try_get("created_at").map_err(read)?,
        started_at: row.try_get("started_at").map_err(read)?,
        completed_at: row.try_get("completed_at").map_err(read)?,
        claimed_at: row.try_get("claimed_at").map_err(read)?,
        error_message: row.try_get("error_message").map_err(read)?,
    })
}

fn finding_from_row(row: &SqliteRow) -> Result<Finding, ScanRepositoryError> {
    let read = |e: sqlx::Error| corrupt(e.to_string());

    let id: String = row.try_get("id").map_err(read)?;
    let scan_id: String = row.try_get("scan_id").map_err(read)?;
    let tool: String = row.try_get("tool").map_err(read)?;
    let risk_level: String = row.try_get("risk_level").map_err(read)?;
    let port: Option<i64> = row.try_get("port").map_err(read)?;
    let raw_output: String = row.try_get("raw_output").map_err(read)?;
    let metadata: String = row.try_get("classification_metadata").map_err(read)?;

    Ok(Finding {
        id: Uuid::parse_str(&id).map_err(|e| corrupt(format!("finding id {}: {}", id, e)))?,
        scan_id: scan_id
            .parse::<ScanId>()
            .map_err(|e| corrupt(format!("scan id {}: {}", scan_id, e)))?,
        tool: tool.parse::<Tool>().map_err(corrupt)?,
        vulnerability_type: row.try_get("vulnerability_type").map_err(read)?,
        risk_level: risk_level.parse::<RiskLevel>().map_err(corrupt)?,
        title: row.try_get("title").map_err(read)?,
        description: row.try_get("description").map_err(read)?,
        fix_suggestion: row.try_get("fix_suggestion").map_err(read)?,
        score: row.try_get("score").map_err(read)?,
        cve_id: row.try_get("cve_id").map_err(read)?,
        affected_component: row.try_get("affected_component").map_err(read)?,
        port: port
            .map(|p| u16::try_from(p).map_err(|_| corrupt(format!("port out of range: {}", p))))
            .transpose()?,
        service: row.try_get("service").map_err(read)?,
        raw_output: serde_json::from_str(&raw_output)?,
        classification_metadata: serde_json::from_str(&metadata)?,
        created_at: row.try_get("created_at").map_err(read)?,
    })
}

impl SqlxScanRepository {
    /// Explain why a conditional write touched no row.
    async fn conflict_for(
        &self,
        id: ScanId,
        expected: ScanStatus,
    ) -> ScanRepositoryError {
        match self.find_scan(id).await {
            Ok(Some(current)) => ScanRepositoryError::StatusConflict {
                id,
                expected,
                actual: current.status,
            },
            Ok(None) => ScanRepositoryError::NotFound(id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl ScanRepository for SqlxScanRepository {
    async fn create_scan(&self, scan: &Scan) -> Result<(), ScanRepositoryError> {
        let options = serde_json::to_string(&scan.options)?;

        let result = sqlx::query(&format!(
            "INSERT INTO scans ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO NOTHING",
            SCAN_COLUMNS
        ))
        .bind(scan.id.to_string())
        .bind(&scan.user_id)
        .bind(&scan.target)
        .bind(scan.scan_type.as_str())
        .bind(scan.status.as_str())
        .bind(i64::from(scan.progress.value()))
        .bind(options)
        .bind(scan.created_at)
        .bind(scan.started_at)
        .bind(scan.completed_at)
        .bind(scan.claimed_at)
        .bind(&scan.error_message)
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("creating scan", e))?;

        if result.rows_affected() == 0 {
            return Err(ScanRepositoryError::AlreadyExists { id: scan.id });
        }

        Ok(())
    }

    async fn find_scan(&self, id: ScanId) -> Result<Option<Scan>, ScanRepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM scans WHERE id = ?", SCAN_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("finding scan", e))?;

        row.as_ref().map(scan_from_row).transpose()
    }

    async fn update_scan(
        &self,
        scan: &Scan,
        expected: ScanStatus,
    ) -> Result<(), ScanRepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE scans
            SET status = ?,
                progress = MAX(progress, ?),
                started_at = ?,
                completed_at = ?,
                claimed_at = ?,
                error_message = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(scan.status.as_str())
        .bind(i64::from(scan.progress.value()))
        .bind(scan.started_at)
        .bind(scan.completed_at)
        .bind(scan.claimed_at)
        .bind(&scan.error_message)
        .bind(scan.id.to_string())
        .bind(expected.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("updating scan", e))?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_for(scan.id, expected).await);
        }

        Ok(())
    }

    async fn record_progress(
        &self,
        id: ScanId,
        progress: Progress,
    ) -> Result<Progress, ScanRepositoryError> {
        sqlx::query(
            r#"
            UPDATE scans
            SET progress = MAX(progress, ?)
            WHERE id = ? AND status IN ('pending', 'running')
            "#,
        )
        .bind(i64::from(progress.value()))
        .bind(id.to_string())
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("recording progress", e))?;

        let stored: Option<i64> = sqlx::query_scalar("SELECT progress FROM scans WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("reading progress", e))?;

        stored
            .map(|p| Progress::new(p.clamp(0, 100) as u8))
            .ok_or(ScanRepositoryError::NotFound(id))
    }

    async fn find_stale_running(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Scan>, ScanRepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scans WHERE status = 'running' ORDER BY created_at",
            SCAN_COLUMNS
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_error("finding running scans", e))?;

        // Timestamps are compared in Rust; their text encoding is not lexically ordered
        let mut stale = Vec::new();
        for row in &rows {
            let scan = scan_from_row(row)?;
            if scan.claimed_at.is_none_or(|claimed| claimed < cutoff) {
                stale.push(scan);
            }
        }
        Ok(stale)
    }

    async fn delete_scan(&self, id: ScanId) -> Result<(), ScanRepositoryError> {
        let result = sqlx::query("DELETE FROM scans WHERE id = ? AND status != 'running'")
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("deleting scan", e))?;

        if result.rows_affected() == 0 {
            return match self.find_scan(id).await? {
                Some(_) => Err(ScanRepositoryError::ScanRunning(id)),
                None => Err(ScanRepositoryError::NotFound(id)),
            };
        }

        Ok(())
    }

    async fn insert_finding(&self, finding: &Finding) -> Result<(), ScanRepositoryError> {
        let raw_output = serde_json::to_string(&finding.raw_output)?;
        let metadata = serde_json::to_string(&finding.classification_metadata)?;

        sqlx::query(&format!(
            "INSERT INTO findings ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            FINDING_COLUMNS
        ))
        .bind(finding.id.to_string())
        .bind(finding.scan_id.to_string())
        .bind(finding.tool.as_str())
        .bind(&finding.vulnerability_type)
        .bind(finding.risk_level.as_str())
        .bind(&finding.title)
        .bind(&finding.description)
        .bind(&finding.fix_suggestion)
        .bind(finding.score)
        .bind(&finding.cve_id)
        .bind(&finding.affected_component)
        .bind(finding.port.map(i64::from))
        .bind(&finding.service)
        .bind(raw_output)
        .bind(metadata)
        .bind(finding.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("inserting finding", e))?;

        Ok(())
    }

    async fn list_findings(&self, scan_id: ScanId) -> Result<Vec<Finding>, ScanRepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM findings WHERE scan_id = ? ORDER BY seq",
            FINDING_COLUMNS
        ))
        .bind(scan_id.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_error("listing findings", e))?;

        rows.iter().map(finding_from_row).collect()
    }

    async fn completed_stages(&self, scan_id: ScanId) -> Result<Vec<Tool>, ScanRepositoryError> {
        let tools: Vec<String> = sqlx::query_scalar(
            "SELECT tool FROM scan_stages WHERE scan_id = ? ORDER BY rowid",
        )
        .bind(scan_id.to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| db_error("listing completed stages", e))?;

        tools
            .iter()
            .map(|tool| tool.parse::<Tool>().map_err(corrupt))
            .collect()
    }

    async fn mark_stage_complete(
        &self,
        scan_id: ScanId,
        tool: Tool,
    ) -> Result<(), ScanRepositoryError> {
        let result = sqlx::query(
            "INSERT INTO scan_stages (scan_id, tool, completed_at) VALUES (?, ?, ?) \
             ON CONFLICT (scan_id, tool) DO NOTHING",
        )
        .bind(scan_id.to_string())
        .bind(tool.as_str())
        .bind(Utc::now())
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(ScanRepositoryError::NotFound(scan_id))
            }
            Err(e) => Err(db_error("marking stage complete", e)),
        }
    }

    async fn clear_stage_findings(
        &self,
        scan_id: ScanId,
        tool: Tool,
    ) -> Result<u64, ScanRepositoryError> {
        let result = sqlx::query("DELETE FROM findings WHERE scan_id = ? AND tool = ?")
            .bind(scan_id.to_string())
            .bind(tool.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("clearing stage findings", e))?;

        Ok(result.rows_affected())
    }
}
