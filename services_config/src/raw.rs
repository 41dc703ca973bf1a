//! Raw configuration document
//!
//! Mirrors the on-disk JSON shape. Every field is optional and signed so
//! that range problems are reported as [`crate::ConfigError`] values instead
//! of opaque deserialization failures.

use serde::Deserialize;

/// Top-level configuration document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    pub scheduler_config: Option<RawSchedulerSection>,
    pub processes: Option<Vec<RawProcess>>,
}

/// `scheduler_config` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSchedulerSection {
    pub time_quantum: Option<i64>,
    pub max_priority: Option<i64>,
    pub aging_threshold: Option<i64>,
    pub context_switch_time: Option<i64>,
    pub max_processes: Option<i64>,
    pub max_dispatch_steps: Option<i64>,
}

/// One entry of the `processes` array
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProcess {
    pub pid: Option<i64>,
    pub priority: Option<i64>,
    pub burst_time: Option<i64>,
    pub io_bound: Option<bool>,
    pub io_interval: Option<i64>,
}
