//! Job value objects

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue-assigned job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Queued, possibly delayed until its availability time
    Waiting,
    /// Claimed by a worker
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// Returns the set of valid target states from the current state.
    ///
    /// ```text
    /// Waiting ──► Active ──► Completed
    ///    ▲          │
    ///    └──────────┴──► Failed
    /// ```
    pub fn valid_transitions(&self) -> &[JobState] {
        match self {
            Self::Waiting => &[Self::Active],
            Self::Active => &[Self::Completed, Self::Failed, Self::Waiting],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, target: JobState) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job state: {}", other)),
        }
    }
}

/// Error returned when an invalid job state transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid job transition from {from} to {to}")]
pub struct JobTransitionError {
    pub from: JobState,
    pub to: JobState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_returns_active_job_to_waiting() {
        assert!(JobState::Active.can_transition_to(JobState::Waiting));
        assert!(!JobState::Waiting.can_transition_to(JobState::Completed));
        assert!(JobState::Failed.valid_transitions().is_empty());
    }

    #[test]
    fn test_state_round_trips_through_str() {
        for state in [
            JobState::Waiting,
            JobState::Active,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<JobState>(), Ok(state));
        }
    }
}
