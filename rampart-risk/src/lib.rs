//! Rampart Risk - Classification of raw tool output
//!
//! [`classify`] is a pure function from a [`RawFinding`](rampart_core::domain::RawFinding)
//! to a [`Classification`]: risk level, score, remediation text and metadata.
//! It never fails; malformed input degrades to an informational result.
//!
//! ```rust,ignore
//! use rampart_core::domain::RawFinding;
//! use rampart_risk::classify;
//!
//! let raw = RawFinding::new("open_port", "Open port 22/tcp").with_port(22).with_service("ssh");
//! let classification = classify(&raw);
//! assert_eq!(classification.score, 6.4);
//! ```

pub mod application;
pub mod domain;

pub use application::classifier::{
    Classification, ClassificationError, classify, fallback_classification, try_classify,
};
pub use domain::profiles::{RiskProfile, select_profile};
