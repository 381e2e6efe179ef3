use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rampart_core::domain::ScanId;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::store::{JobStore, JobStoreError};
use crate::domain::{Job, JobId, JobState};

/// SQLite-backed job store. Each job is one row holding its JSON record.
pub struct SqlxJobStore {
    pool: Arc<SqlitePool>,
}

impl SqlxJobStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> JobStoreError {
    tracing::error!("Database error {}: {}", context, e);
    JobStoreError::Database(e.to_string())
}

/// Decode the JSON records of `rows`, in enqueue order.
fn jobs_from_rows(rows: Vec<SqliteRow>) -> Result<Vec<Job>, JobStoreError> {
    let mut jobs = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row
            .try_get("id")
            .map_err(|e| db_error("reading job id", e))?;
        let record: String = row
            .try_get("record")
            .map_err(|e| db_error("reading job record", e))?;
        let job: Job = serde_json::from_str(&record).map_err(|e| JobStoreError::CorruptRecord {
            id: id.clone(),
            message: e.to_string(),
        })?;
        jobs.push(job);
    }
    jobs.sort_by_key(|job| job.seq);
    Ok(jobs)
}

#[async_trait]
impl JobStore for SqlxJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), JobStoreError> {
        let record = serde_json::to_string(job)?;

        sqlx::query(
            "INSERT INTO jobs (id, scan_id, state, record, updated_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET state = excluded.state, record = excluded.record, \
             updated_at = excluded.updated_at",
        )
        .bind(job.id.to_string())
        .bind(job.payload.scan_id.to_string())
        .bind(job.state.as_str())
        .bind(record)
        .bind(Utc::now())
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("saving job", e))?;

        tracing::debug!(job_id = %job.id, state = %job.state, "Job record saved");
        Ok(())
    }

    async fn delete_job(&self, id: JobId) -> Result<(), JobStoreError> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("deleting job", e))?;
        Ok(())
    }

    async fn load_unfinished(&self) -> Result<Vec<Job>, JobStoreError> {
        let rows = sqlx::query("SELECT id, record FROM jobs WHERE state IN (?, ?)")
            .bind(JobState::Waiting.as_str())
            .bind(JobState::Active.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| db_error("loading unfinished jobs", e))?;

        jobs_from_rows(rows)
    }

    async fn load_for_scan(&self, scan_id: ScanId) -> Result<Vec<Job>, JobStoreError> {
        let rows = sqlx::query("SELECT id, record FROM jobs WHERE scan_id = ?")
            .bind(scan_id.to_string())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| db_error("loading scan jobs", e))?;

        jobs_from_rows(rows)
    }
}
