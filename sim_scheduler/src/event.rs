//! Scheduling events
//!
//! One [`ScheduleEvent`] is recorded per dispatch iteration that ran a
//! process. Events are kept in chronological order and handed to the event
//! log collaborator once the run drains.

use crate::process::{ProcessRecord, ProcessState};
use core_types::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to the dispatched process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Ran a slice and is still runnable
    Running,
    /// Ran until its I/O triggered
    IoWait,
    /// Ran its final slice
    Finished,
}

impl EventKind {
    /// Classifies a record after its slice
    pub fn after_slice(record: &ProcessRecord) -> Self {
        if !record.has_remaining_work() {
            EventKind::Finished
        } else if record.is_waiting_io() {
            EventKind::IoWait
        } else {
            EventKind::Running
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Running => "RUNNING",
            EventKind::IoWait => "IO_WAIT",
            EventKind::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log record for one dispatch iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub pid: Pid,
    pub priority: u32,
    pub event: EventKind,
    /// Time the process had waited when it was dispatched
    pub waiting_time: u64,
    pub remaining_time: u64,
    pub io_bound: bool,
    pub io_interval: u64,
    /// CPU consumed since the last I/O burst started
    pub cpu_used: u64,
    pub process_state: ProcessState,
    /// Simulated clock after the slice
    pub timestamp: u64,
}

impl ScheduleEvent {
    /// Builds the event for `record` right after its slice
    pub fn from_record(record: &ProcessRecord, waited: u64, timestamp: u64) -> Self {
        Self {
            pid: record.pid(),
            priority: record.priority(),
            event: EventKind::after_slice(record),
            waiting_time: waited,
            remaining_time: record.remaining_time(),
            io_bound: record.is_io_bound(),
            io_interval: record.io_interval(),
            cpu_used: record.cpu_used_since_io(),
            process_state: record.state(),
            timestamp,
        }
    }
}
