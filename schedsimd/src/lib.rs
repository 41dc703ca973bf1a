//! # Scheduler Simulation Runner
//!
//! Host-side glue around the simulation core.
//!
//! ## Philosophy
//!
//! - **Host owns I/O**: The scheduler never touches files or the terminal
//! - **Dispatch runs on a worker**: The host only receives snapshots
//! - **Outputs are plain JSON arrays**: One event log, one metrics report
//!
//! ## Responsibilities
//!
//! The runner:
//! - Loads and validates the configuration file
//! - Creates the log directory and output files
//! - Runs the scheduler on a dispatch worker thread
//! - Persists the event log and, for completed runs, the metrics report

pub mod runtime;

pub use runtime::{RunReport, RuntimeConfig, RuntimeError, SimRuntime};
