//! Rampart Core - Foundation crate for the Rampart scan engine
//!
//! This crate provides shared functionality used across all Rampart crates:
//!
//! # Modules
//!
//! - [`config`] - Strongly-typed configuration with TOML and environment variable support
//! - [`domain`] - Scans, findings, raw tool output and the repository interface
//! - [`infrastructure`] - SQLite connection bootstrap and repository implementations
//! - [`logging`] - Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! rampart-core/
//! ├── domain/           # Pure business logic
//! │   ├── scan/         # Scan entity, status state machine, scan types
//! │   ├── finding/      # Finding, RawFinding, RiskLevel
//! │   └── repositories  # ScanRepository trait
//! ├── infrastructure/   # External integrations
//! │   ├── database      # SQLite pool + embedded migrations
//! │   └── repositories/ # SQLx and in-memory repositories
//! └── config/           # Configuration management
//! ```
//!
//! # Configuration
//!
//! ```rust,ignore
//! use rampart_core::Config;
//!
//! let config = Config::load()?;
//! ```
//!
//! Environment variables use the `RAMPART__` prefix with double underscore separators:
//!
//! ```bash
//! RAMPART__QUEUE__CONCURRENCY=5
//! RAMPART__ADAPTERS__FALLBACK_MODE=strict
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
