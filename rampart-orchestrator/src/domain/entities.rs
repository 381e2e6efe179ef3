//! Job entities

use std::time::Duration;

use chrono::{DateTime, Utc};
use rampart_core::domain::{Progress, ScanId, ScanOptions, ScanType};
use serde::{Deserialize, Serialize};

use super::value_objects::{JobId, JobState, JobTransitionError};

/// Default priority; lower values are dequeued first
pub const DEFAULT_PRIORITY: i32 = 10;

/// `now + delay`, saturating at the latest representable time
pub(crate) fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Work description carried by a scan job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub scan_id: ScanId,
    pub target: String,
    pub scan_type: ScanType,
    #[serde(default)]
    pub options: ScanOptions,
}

/// Scheduling options for one enqueue call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub priority: i32,
    /// Keep the job invisible to workers until this elapses
    pub delay: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            delay: Duration::ZERO,
        }
    }
}

impl JobOptions {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Queue record for one scan execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,
    pub priority: i32,
    /// Monotonic enqueue sequence, FIFO tie-breaker within a priority
    pub seq: u64,
    pub state: JobState,
    /// Attempts started so far
    pub attempts: u32,
    pub max_attempts: u32,
    pub progress: Progress,
    /// Earliest time a worker may claim the job
    pub available_at: DateTime<Utc>,
    /// Backoff applied before the pending retry, in milliseconds
    pub retry_delay_ms: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        payload: JobPayload,
        options: JobOptions,
        seq: u64,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::generate(),
            payload,
            priority: options.priority,
            seq,
            state: JobState::Waiting,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            progress: Progress::ZERO,
            available_at: after(now, options.delay),
            retry_delay_ms: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn transition(&mut self, to: JobState) -> Result<(), JobTransitionError> {
        if !self.state.can_transition_to(to) {
            return Err(JobTransitionError {
                from: self.state,
                to,
            });
        }

        let now = Utc::now();
        if to.is_terminal() {
            self.finished_at = Some(now);
        }
        self.state = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Waiting && self.available_at <= now
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            id: self.id,
            scan_id: self.payload.scan_id,
            payload: self.payload.clone(),
            state: self.state,
            progress: self.progress,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            next_attempt_at: (self.state == JobState::Waiting).then_some(self.available_at),
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

/// Read-only job status as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub scan_id: ScanId,
    pub payload: JobPayload,
    pub state: JobState,
    pub progress: Progress,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Number of retained jobs per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> JobPayload {
        JobPayload {
            scan_id: ScanId::generate(),
            target: "example.com".to_string(),
            scan_type: ScanType::PortScan,
            options: ScanOptions::new().with("ports", "22"),
        }
    }

    #[test]
    fn test_delay_sets_availability() {
        let now = Utc::now();
        let job = Job::new(
            payload(),
            JobOptions::default().with_delay(Duration::from_secs(30)),
            0,
            3,
            now,
        );
        assert!(!job.is_ready(now));
        assert!(job.is_ready(now + chrono::Duration::seconds(30)));
    }

    #[test]
    fn test_terminal_transition_stamps_finish_time() {
        let mut job = Job::new(payload(), JobOptions::default(), 0, 3, Utc::now());
        job.transition(JobState::Active).unwrap();
        job.transition(JobState::Completed).unwrap();
        assert!(job.finished_at.is_some());
        assert!(job.transition(JobState::Waiting).is_err());
    }

    #[test]
    fn test_record_round_trips_as_json() {
        let job = Job::new(payload(), JobOptions::default(), 7, 3, Utc::now());
        let json = serde_json::to_string(&job).unwrap();
        let restored: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, job);
    }
}
