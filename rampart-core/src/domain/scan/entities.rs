//! Scan entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{
    Progress, ScanId, ScanOptions, ScanStatus, ScanTransitionError, ScanType,
};

/// One request to assess a target with one or more tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    /// Owner as known by the submission layer
    pub user_id: Option<String>,
    pub target: String,
    pub scan_type: ScanType,
    pub status: ScanStatus,
    pub progress: Progress,
    pub options: ScanOptions,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Last time a worker claimed this scan
    pub claimed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Scan {
    /// Create a scan in [`ScanStatus::Pending`].
    pub fn new(target: impl Into<String>, scan_type: ScanType, options: ScanOptions) -> Self {
        Self {
            id: ScanId::generate(),
            user_id: None,
            target: target.into(),
            scan_type,
            status: ScanStatus::Pending,
            progress: Progress::ZERO,
            options,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            claimed_at: None,
            error_message: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Validate and apply a status transition, stamping the matching timestamps.
    pub fn transition(&mut self, to: ScanStatus) -> Result<(), ScanTransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(ScanTransitionError {
                from: self.status,
                to,
            });
        }

        let now = Utc::now();
        match to {
            ScanStatus::Running => {
                self.started_at.get_or_insert(now);
                self.claimed_at = Some(now);
            }
            ScanStatus::Complete => {
                self.progress = Progress::COMPLETE;
                self.completed_at = Some(now);
            }
            ScanStatus::Error | ScanStatus::Cancelled => {
                self.completed_at = Some(now);
            }
            ScanStatus::Pending => {}
        }

        self.status = to;
        Ok(())
    }

    /// Raise progress; lower values and updates after a terminal status are ignored.
    pub fn record_progress(&mut self, progress: Progress) -> Progress {
        if !self.is_terminal() && progress > self.progress {
            self.progress = progress;
        }
        self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan() -> Scan {
        Scan::new("example.com", ScanType::Combined, ScanOptions::new())
    }

    #[test]
    fn test_new_scan_is_pending() {
        let scan = scan();
        assert_eq!(scan.status, ScanStatus::Pending);
        assert_eq!(scan.progress, Progress::ZERO);
        assert!(scan.started_at.is_none());
    }

    #[test]
    fn test_start_then_complete_sets_timestamps() {
        let mut scan = scan();
        scan.transition(ScanStatus::Running).unwrap();
        assert!(scan.started_at.is_some());
        assert!(scan.claimed_at.is_some());

        scan.transition(ScanStatus::Complete).unwrap();
        assert_eq!(scan.progress, Progress::COMPLETE);
        assert!(scan.completed_at.is_some());
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        let mut scan = scan();
        scan.transition(ScanStatus::Cancelled).unwrap();
        let err = scan.transition(ScanStatus::Running).unwrap_err();
        assert_eq!(err.from, ScanStatus::Cancelled);
        assert_eq!(err.to, ScanStatus::Running);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut scan = scan();
        scan.transition(ScanStatus::Running).unwrap();
        assert_eq!(scan.record_progress(Progress::new(40)).value(), 40);
        assert_eq!(scan.record_progress(Progress::new(20)).value(), 40);
        scan.transition(ScanStatus::Error).unwrap();
        assert_eq!(scan.record_progress(Progress::new(90)).value(), 40);
    }
}
