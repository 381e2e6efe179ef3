//! Rampart - Scan orchestration engine
//!
//! Library half of the `rampart` binary: engine wiring, background workers
//! and the command-line interface.

mod app;
pub mod cli;
pub mod shutdown;
pub mod workers;

pub use app::{Engine, EngineError, EngineHandle, create_engine, create_engine_with_registry};
pub use rampart_core::{Config, init_tracing};
