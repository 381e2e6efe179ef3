//! Finding value objects

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Normalized severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        Self::Info,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Critical,
    ];

    /// Map a score in `[0, 10]` onto a level.
    ///
    /// | score | level |
    /// |-------|-------|
    /// | ≥ 9.0 | critical |
    /// | ≥ 7.0 | high |
    /// | ≥ 4.0 | medium |
    /// | > 0.0 | low |
    /// | else  | info |
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else if score > 0.0 {
            Self::Low
        } else {
            Self::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| format!("unknown risk level: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(RiskLevel::from_score(10.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(9.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(8.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(7.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(6.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(4.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(3.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Info);
    }

    #[test]
    fn test_levels_are_ordered_by_severity() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Low > RiskLevel::Info);
    }
}
