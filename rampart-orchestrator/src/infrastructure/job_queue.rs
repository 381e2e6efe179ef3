//! Priority job queue with delayed visibility, retry backoff and retention
//!
//! All state lives behind one async mutex; a job is claimed under that lock
//! so it can be handed to exactly one worker. Every state change is written
//! through the [`JobStore`] before it becomes visible in memory.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rampart_core::config::QueueConfig;
use rampart_core::domain::{Progress, ScanId};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use super::job_store::{JobStore, JobStoreError};
use crate::domain::entities::after;
use crate::domain::{
    Job, JobCounts, JobId, JobOptions, JobPayload, JobState, JobStatusView, JobTransitionError,
};

/// Errors returned by queue operations.
#[derive(Debug, thiserror::Error)]
pub enum JobQueueError {
    #[error("Job store error: {0}")]
    Store(#[from] JobStoreError),
    #[error("Job not found: {0}")]
    NotFound(JobId),
    #[error(transparent)]
    InvalidState(#[from] JobTransitionError),
}

/// Retry and retention settings
#[derive(Debug, Clone)]
pub struct JobQueueSettings {
    /// Total attempts per job, including the first one
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub keep_completed: usize,
    pub keep_failed: usize,
    pub default_priority: i32,
}

impl Default for JobQueueSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for JobQueueSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base(),
            keep_completed: config.keep_completed,
            keep_failed: config.keep_failed,
            default_priority: config.default_priority,
        }
    }
}

impl JobQueueSettings {
    /// Delay before the retry that follows the `failed_attempts`-th failure.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

/// What happened to a job whose attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back in the waiting state until `next_attempt_at`
    Retrying {
        attempt: u32,
        delay: Duration,
        next_attempt_at: DateTime<Utc>,
    },
    /// No attempts left; the job is failed
    Exhausted { attempts: u32 },
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    next_seq: u64,
    /// Terminal jobs in finishing order, oldest first
    completed: VecDeque<JobId>,
    failed: VecDeque<JobId>,
}

impl QueueState {
    fn active_scans(&self) -> HashSet<ScanId> {
        self.jobs
            .values()
            .filter(|job| job.state == JobState::Active)
            .map(|job| job.payload.scan_id)
            .collect()
    }

    /// Waiting jobs a worker could take once they become available.
    fn claimable(&self) -> impl Iterator<Item = &Job> {
        let active = self.active_scans();
        self.jobs.values().filter(move |job| {
            job.state == JobState::Waiting && !active.contains(&job.payload.scan_id)
        })
    }

    fn next_ready(&self, now: DateTime<Utc>) -> Option<JobId> {
        self.claimable()
            .filter(|job| job.available_at <= now)
            .min_by_key(|job| (job.priority, job.seq))
            .map(|job| job.id)
    }

    fn earliest_availability(&self) -> Option<DateTime<Utc>> {
        self.claimable().map(|job| job.available_at).min()
    }

    fn job(&self, id: JobId) -> Result<&Job, JobQueueError> {
        self.jobs.get(&id).ok_or(JobQueueError::NotFound(id))
    }
}

/// In-process job queue backed by a durable [`JobStore`]
pub struct JobQueue {
    state: Mutex<QueueState>,
    store: Arc<dyn JobStore>,
    settings: JobQueueSettings,
    changed: Notify,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, settings: JobQueueSettings) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            store,
            settings,
            changed: Notify::new(),
        }
    }

    pub fn settings(&self) -> &JobQueueSettings {
        &self.settings
    }

    /// Reload unfinished jobs from the store.
    ///
    /// Jobs that were active when the process stopped go back to waiting;
    /// the interrupted attempt is not counted.
    pub async fn recover(&self) -> Result<usize, JobQueueError> {
        let stored = self.store.load_unfinished().await?;
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let mut recovered = 0;
        for mut job in stored {
            if state.jobs.contains_key(&job.id) {
                continue;
            }
            if job.state == JobState::Active {
                job.transition(JobState::Waiting)?;
                job.attempts = job.attempts.saturating_sub(1);
                job.progress = Progress::ZERO;
                job.available_at = now;
                self.store.save_job(&job).await?;
                info!(job_id = %job.id, scan_id = %job.payload.scan_id, "Re-queued interrupted job");
            }
            state.next_seq = state.next_seq.max(job.seq + 1);
            state.jobs.insert(job.id, job);
            recovered += 1;
        }
        drop(state);

        if recovered > 0 {
            info!(recovered, "Recovered unfinished jobs");
            self.changed.notify_waiters();
        }
        Ok(recovered)
    }

    /// Queue a job with the default priority and no delay.
    pub async fn enqueue(&self, payload: JobPayload) -> Result<JobId, JobQueueError> {
        let options = JobOptions::default().with_priority(self.settings.default_priority);
        self.enqueue_with(payload, options).await
    }

    pub async fn enqueue_with(
        &self,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<JobId, JobQueueError> {
        let mut state = self.state.lock().await;
        let job = Job::new(
            payload,
            options,
            state.next_seq,
            self.settings.max_attempts,
            Utc::now(),
        );
        self.store.save_job(&job).await?;

        let id = job.id;
        info!(
            job_id = %id,
            scan_id = %job.payload.scan_id,
            scan_type = %job.payload.scan_type,
            priority = job.priority,
            available_at = %job.available_at,
            "Job enqueued"
        );
        state.next_seq += 1;
        state.jobs.insert(id, job);
        drop(state);

        self.changed.notify_waiters();
        Ok(id)
    }

    /// Resolve once some waiting job can be claimed.
    ///
    /// Cancel-safe. Another worker may win the claim, so callers follow up
    /// with [`JobQueue::try_claim`] and loop on `None`.
    pub async fn wait_until_ready(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (ready, earliest) = {
                let state = self.state.lock().await;
                let now = Utc::now();
                (state.next_ready(now).is_some(), state.earliest_availability())
            };
            if ready {
                return;
            }

            match earliest {
                Some(at) => {
                    let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Claim the best available job: lowest priority value first, then
    /// enqueue order. Skips jobs whose scan already has an active job.
    pub async fn try_claim(&self) -> Result<Option<Job>, JobQueueError> {
        let mut state = self.state.lock().await;
        let Some(id) = state.next_ready(Utc::now()) else {
            return Ok(None);
        };

        let mut job = state.job(id)?.clone();
        job.transition(JobState::Active)?;
        job.attempts += 1;
        job.progress = Progress::ZERO;
        self.store.save_job(&job).await?;

        debug!(
            job_id = %id,
            scan_id = %job.payload.scan_id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "Job claimed"
        );
        state.jobs.insert(id, job.clone());
        Ok(Some(job))
    }

    /// Wait for and claim the next job.
    pub async fn claim(&self) -> Result<Job, JobQueueError> {
        loop {
            self.wait_until_ready().await;
            if let Some(job) = self.try_claim().await? {
                return Ok(job);
            }
        }
    }

    /// Raise the progress of an active job. Lower values are ignored.
    pub async fn update_progress(
        &self,
        id: JobId,
        progress: Progress,
    ) -> Result<Progress, JobQueueError> {
        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
        if job.state == JobState::Active && progress > job.progress {
            job.progress = progress;
        }
        Ok(job.progress)
    }

    pub async fn complete(
        &self,
        id: JobId,
        result: serde_json::Value,
    ) -> Result<(), JobQueueError> {
        let mut state = self.state.lock().await;
        let mut job = state.job(id)?.clone();
        job.transition(JobState::Completed)?;
        job.progress = Progress::COMPLETE;
        job.result = Some(result);
        job.error = None;
        self.store.save_job(&job).await?;

        info!(job_id = %id, scan_id = %job.payload.scan_id, attempts = job.attempts, "Job completed");
        state.jobs.insert(id, job);
        state.completed.push_back(id);
        self.evict(&mut state).await;
        drop(state);

        self.changed.notify_waiters();
        Ok(())
    }

    /// Record a failed attempt and either schedule a retry with backoff or
    /// mark the job failed.
    pub async fn fail(&self, id: JobId, error: &str) -> Result<FailureOutcome, JobQueueError> {
        let mut state = self.state.lock().await;
        let mut job = state.job(id)?.clone();
        job.error = Some(error.to_string());

        let outcome = if job.attempts < job.max_attempts {
            let delay = self.settings.backoff(job.attempts);
            let next_attempt_at = after(Utc::now(), delay);
            job.transition(JobState::Waiting)?;
            job.available_at = next_attempt_at;
            job.retry_delay_ms = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
            FailureOutcome::Retrying {
                attempt: job.attempts,
                delay,
                next_attempt_at,
            }
        } else {
            job.transition(JobState::Failed)?;
            job.retry_delay_ms = None;
            FailureOutcome::Exhausted {
                attempts: job.attempts,
            }
        };
        self.store.save_job(&job).await?;

        let scan_id = job.payload.scan_id;
        state.jobs.insert(id, job);
        if matches!(outcome, FailureOutcome::Exhausted { .. }) {
            warn!(job_id = %id, scan_id = %scan_id, error, "Job failed permanently");
            state.failed.push_back(id);
            self.evict(&mut state).await;
        }
        drop(state);

        self.changed.notify_waiters();
        Ok(outcome)
    }

    /// Put an active job back to waiting after its outcome could not be
    /// recorded, and return when it becomes claimable again.
    ///
    /// The attempt is not counted. The store write is best effort: when it
    /// fails the record stays active and [`JobQueue::recover`] re-queues it
    /// on the next start, while this process stops treating the scan as busy.
    pub async fn release(
        &self,
        id: JobId,
        delay: Duration,
    ) -> Result<DateTime<Utc>, JobQueueError> {
        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(&id).ok_or(JobQueueError::NotFound(id))?;
        job.transition(JobState::Waiting)?;
        job.attempts = job.attempts.saturating_sub(1);
        job.progress = Progress::ZERO;
        job.available_at = after(Utc::now(), delay);
        let next_attempt_at = job.available_at;

        if let Err(e) = self.store.save_job(job).await {
            warn!(job_id = %id, error = %e, "Released job not persisted");
        }
        info!(
            job_id = %id,
            scan_id = %job.payload.scan_id,
            next_attempt_at = %next_attempt_at,
            "Job released"
        );
        drop(state);

        self.changed.notify_waiters();
        Ok(next_attempt_at)
    }

    /// Drop the oldest terminal jobs beyond the retention limits.
    async fn evict(&self, state: &mut QueueState) {
        let mut evicted = Vec::new();
        while state.completed.len() > self.settings.keep_completed {
            evicted.extend(state.completed.pop_front());
        }
        while state.failed.len() > self.settings.keep_failed {
            evicted.extend(state.failed.pop_front());
        }

        for id in evicted {
            state.jobs.remove(&id);
            if let Err(e) = self.store.delete_job(id).await {
                warn!(job_id = %id, error = %e, "Failed to delete evicted job record");
            }
            debug!(job_id = %id, "Evicted retained job");
        }
    }

    /// Status of a known job; `None` once evicted or never enqueued.
    pub async fn get_status(&self, id: JobId) -> Option<JobStatusView> {
        self.state.lock().await.jobs.get(&id).map(Job::status_view)
    }

    /// Most recently enqueued job for a scan, if still retained.
    pub async fn latest_for_scan(&self, scan_id: ScanId) -> Option<JobStatusView> {
        self.state
            .lock()
            .await
            .jobs
            .values()
            .filter(|job| job.payload.scan_id == scan_id)
            .max_by_key(|job| job.seq)
            .map(Job::status_view)
    }

    /// Latest job of a scan, falling back to the store when this process
    /// never loaded it. Read-only: stored active jobs are reported as they
    /// are, since another process may be running them.
    pub async fn find_for_scan(
        &self,
        scan_id: ScanId,
    ) -> Result<Option<JobStatusView>, JobQueueError> {
        if let Some(status) = self.latest_for_scan(scan_id).await {
            return Ok(Some(status));
        }
        let stored = self.store.load_for_scan(scan_id).await?;
        Ok(stored.last().map(Job::status_view))
    }

    /// Whether a waiting or active job exists for the scan.
    pub async fn has_pending_job_for_scan(&self, scan_id: ScanId) -> bool {
        self.state
            .lock()
            .await
            .jobs
            .values()
            .any(|job| job.payload.scan_id == scan_id && !job.state.is_terminal())
    }

    pub async fn counts(&self) -> JobCounts {
        let state = self.state.lock().await;
        let mut counts = JobCounts::default();
        for job in state.jobs.values() {
            match job.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
