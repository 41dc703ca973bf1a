//! # Configuration Service
//!
//! Loads and validates the simulation configuration.
//!
//! ## Philosophy
//!
//! - **Fail fast**: Every structural problem is rejected before the run starts
//! - **Typed settings**: Raw JSON numbers become strongly typed values once
//! - **Load once**: A validated configuration is immutable; there is no
//!   mid-run reconfiguration
//!
//! ## Format
//!
//! ```json
//! {
//!   "scheduler_config": { "time_quantum": 4, "max_priority": 3,
//!                         "aging_threshold": 5, "context_switch_time": 0 },
//!   "processes": [
//!     { "pid": 1, "priority": 2, "burst_time": 10, "io_bound": true, "io_interval": 5 }
//!   ]
//! }
//! ```
//!
//! Every scheduler value is optional and falls back to its default. A
//! [`SimulationConfig`] can only be obtained through validation, so code
//! that receives one never sees a partially checked configuration.

pub mod raw;

use core_types::Pid;
use raw::{RawConfig, RawProcess, RawSchedulerSection};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default CPU units granted per dispatch
pub const DEFAULT_TIME_QUANTUM: u64 = 4;
/// Default number of priority levels
pub const DEFAULT_MAX_PRIORITY: u32 = 3;
/// Default aging threshold, in quanta
pub const DEFAULT_AGING_THRESHOLD: u64 = 5;
/// Default cost of switching between processes
pub const DEFAULT_CONTEXT_SWITCH_TIME: u64 = 0;
/// Default capacity of the process pool (and of every ready queue)
pub const DEFAULT_MAX_PROCESSES: usize = 64;
/// Highest accepted value for `max_priority`
pub const PRIORITY_LEVEL_LIMIT: u32 = 10;

/// Errors produced while loading or validating configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    /// The configuration is not valid JSON or has the wrong shape
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// No `processes` list present
    #[error("Error in process config - missing process array")]
    MissingProcesses,

    /// `processes` is present but empty
    #[error("Error in process config - empty process array")]
    EmptyProcesses,

    /// Two descriptors share a pid
    #[error("Duplicate PID found: {0}")]
    DuplicatePid(i64),

    /// A scheduler value is outside its valid range
    #[error("Error in {field} in scheduler config: {value} is out of range")]
    InvalidSchedulerValue { field: &'static str, value: i64 },

    /// More processes than the configured capacity
    #[error("Too many processes: {count} exceeds the maximum of {max}")]
    TooManyProcesses { count: usize, max: usize },

    /// A descriptor lacks a required field
    #[error("Process at position {position} is missing required field {field}")]
    MissingField {
        position: usize,
        field: &'static str,
    },

    /// A descriptor value is outside its valid range
    #[error("Invalid {field} for process {pid}: {value}")]
    InvalidProcessValue {
        pid: i64,
        field: &'static str,
        value: i64,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Scheduler-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSettings {
    /// Maximum CPU units per dispatch
    pub time_quantum: u64,
    /// Number of priority levels; 1 is the most urgent
    pub max_priority: u32,
    /// Waiting time, in quanta, before a process is promoted
    pub aging_threshold: u64,
    /// Cost charged when the running process changes
    pub context_switch_time: u64,
    /// Capacity of the process pool and of each ready queue
    pub max_processes: usize,
    /// Optional guard on the number of dispatch iterations
    pub max_dispatch_steps: Option<u64>,
}

impl SchedulerSettings {
    /// Checks every value against its valid range
    pub fn validate(&self) -> ConfigResult<()> {
        if self.time_quantum == 0 {
            return Err(ConfigError::InvalidSchedulerValue {
                field: "time_quantum",
                value: 0,
            });
        }
        if self.max_priority == 0 || self.max_priority > PRIORITY_LEVEL_LIMIT {
            return Err(ConfigError::InvalidSchedulerValue {
                field: "max_priority",
                value: i64::from(self.max_priority),
            });
        }
        if self.aging_threshold == 0 {
            return Err(ConfigError::InvalidSchedulerValue {
                field: "aging_threshold",
                value: 0,
            });
        }
        if self.max_processes == 0 {
            return Err(ConfigError::InvalidSchedulerValue {
                field: "max_processes",
                value: 0,
            });
        }
        if self.max_dispatch_steps == Some(0) {
            return Err(ConfigError::InvalidSchedulerValue {
                field: "max_dispatch_steps",
                value: 0,
            });
        }
        Ok(())
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            time_quantum: DEFAULT_TIME_QUANTUM,
            max_priority: DEFAULT_MAX_PRIORITY,
            aging_threshold: DEFAULT_AGING_THRESHOLD,
            context_switch_time: DEFAULT_CONTEXT_SWITCH_TIME,
            max_processes: DEFAULT_MAX_PROCESSES,
            max_dispatch_steps: None,
        }
    }
}

/// Description of one simulated process
///
/// `priority` is kept as given; values outside `1..=max_priority` are
/// clamped by the scheduler when it seeds its queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDescriptor {
    pub pid: Pid,
    pub priority: i64,
    pub burst_time: u64,
    pub io_bound: bool,
    pub io_interval: u64,
}

impl ProcessDescriptor {
    /// Creates a CPU-only descriptor
    pub fn new(pid: u32, priority: i64, burst_time: u64) -> Self {
        Self {
            pid: Pid::new(pid),
            priority,
            burst_time,
            io_bound: false,
            io_interval: 0,
        }
    }

    /// Marks the process as I/O-bound, blocking after `io_interval` CPU units
    pub fn with_io(mut self, io_interval: u64) -> Self {
        self.io_bound = true;
        self.io_interval = io_interval;
        self
    }

    fn validate(&self) -> ConfigResult<()> {
        let pid = i64::from(self.pid.get());
        if self.burst_time == 0 {
            return Err(ConfigError::InvalidProcessValue {
                pid,
                field: "burst_time",
                value: 0,
            });
        }
        if self.io_bound && self.io_interval == 0 {
            return Err(ConfigError::InvalidProcessValue {
                pid,
                field: "io_interval",
                value: 0,
            });
        }
        Ok(())
    }
}

/// A fully validated simulation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationConfig {
    scheduler: SchedulerSettings,
    processes: Vec<ProcessDescriptor>,
}

impl SimulationConfig {
    /// Validates typed settings and descriptors
    pub fn new(
        scheduler: SchedulerSettings,
        processes: Vec<ProcessDescriptor>,
    ) -> ConfigResult<Self> {
        scheduler.validate()?;

        if processes.is_empty() {
            return Err(ConfigError::EmptyProcesses);
        }
        if processes.len() > scheduler.max_processes {
            return Err(ConfigError::TooManyProcesses {
                count: processes.len(),
                max: scheduler.max_processes,
            });
        }

        let mut seen = HashSet::new();
        for descriptor in &processes {
            if !seen.insert(descriptor.pid) {
                return Err(ConfigError::DuplicatePid(i64::from(descriptor.pid.get())));
            }
            descriptor.validate()?;
        }

        Ok(Self {
            scheduler,
            processes,
        })
    }

    /// Parses and validates a JSON document
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let raw: RawConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Reads, parses and validates a JSON file
    pub fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Converts the raw document, applying defaults
    pub fn from_raw(raw: RawConfig) -> ConfigResult<Self> {
        let scheduler = scheduler_from_raw(raw.scheduler_config.unwrap_or_default())?;

        let raw_processes = raw.processes.ok_or(ConfigError::MissingProcesses)?;
        if raw_processes.is_empty() {
            return Err(ConfigError::EmptyProcesses);
        }

        let processes = raw_processes
            .into_iter()
            .enumerate()
            .map(|(position, raw)| descriptor_from_raw(position, raw))
            .collect::<ConfigResult<Vec<_>>>()?;

        Self::new(scheduler, processes)
    }

    /// Returns the scheduler settings
    pub fn scheduler(&self) -> &SchedulerSettings {
        &self.scheduler
    }

    /// Returns the process descriptors in configuration order
    pub fn processes(&self) -> &[ProcessDescriptor] {
        &self.processes
    }
}

fn positive(field: &'static str, value: Option<i64>, default: u64) -> ConfigResult<u64> {
    match value {
        None => Ok(default),
        Some(v) if v > 0 => Ok(v as u64),
        Some(v) => Err(ConfigError::InvalidSchedulerValue { field, value: v }),
    }
}

fn scheduler_from_raw(raw: RawSchedulerSection) -> ConfigResult<SchedulerSettings> {
    let defaults = SchedulerSettings::default();

    let time_quantum = positive("time_quantum", raw.time_quantum, defaults.time_quantum)?;

    let max_priority = match raw.max_priority {
        None => defaults.max_priority,
        Some(v) if v >= 1 && v <= i64::from(PRIORITY_LEVEL_LIMIT) => v as u32,
        Some(v) => {
            return Err(ConfigError::InvalidSchedulerValue {
                field: "max_priority",
                value: v,
            })
        }
    };

    let aging_threshold = positive(
        "aging_threshold",
        raw.aging_threshold,
        defaults.aging_threshold,
    )?;

    let context_switch_time = match raw.context_switch_time {
        None => defaults.context_switch_time,
        Some(v) if v >= 0 => v as u64,
        Some(v) => {
            return Err(ConfigError::InvalidSchedulerValue {
                field: "context_switch_time",
                value: v,
            })
        }
    };

    let max_processes = positive(
        "max_processes",
        raw.max_processes,
        defaults.max_processes as u64,
    )? as usize;

    let max_dispatch_steps = match raw.max_dispatch_steps {
        None => None,
        Some(v) if v > 0 => Some(v as u64),
        Some(v) => {
            return Err(ConfigError::InvalidSchedulerValue {
                field: "max_dispatch_steps",
                value: v,
            })
        }
    };

    Ok(SchedulerSettings {
        time_quantum,
        max_priority,
        aging_threshold,
        context_switch_time,
        max_processes,
        max_dispatch_steps,
    })
}

fn descriptor_from_raw(position: usize, raw: RawProcess) -> ConfigResult<ProcessDescriptor> {
    let pid = raw.pid.ok_or(ConfigError::MissingField {
        position,
        field: "pid",
    })?;
    let priority = raw.priority.ok_or(ConfigError::MissingField {
        position,
        field: "priority",
    })?;
    let burst_time = raw.burst_time.ok_or(ConfigError::MissingField {
        position,
        field: "burst_time",
    })?;

    let pid_value = u32::try_from(pid).map_err(|_| ConfigError::InvalidProcessValue {
        pid,
        field: "pid",
        value: pid,
    })?;

    if burst_time <= 0 {
        return Err(ConfigError::InvalidProcessValue {
            pid,
            field: "burst_time",
            value: burst_time,
        });
    }

    let io_bound = raw.io_bound.unwrap_or(false);
    let io_interval = raw.io_interval.unwrap_or(0);
    if io_interval < 0 || (io_bound && io_interval == 0) {
        return Err(ConfigError::InvalidProcessValue {
            pid,
            field: "io_interval",
            value: io_interval,
        });
    }

    Ok(ProcessDescriptor {
        pid: Pid::new(pid_value),
        priority,
        burst_time: burst_time as u64,
        io_bound,
        io_interval: io_interval as u64,
    })
}
