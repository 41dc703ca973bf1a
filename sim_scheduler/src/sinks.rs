//! Collaborator seams used when a run drains
//!
//! The scheduler does not know how events are persisted or how metrics are
//! computed. At DRAINED it hands its event log to an [`EventLogSink`] and
//! its final process pool to a [`MetricsCollector`].

use crate::event::ScheduleEvent;
use crate::process::ProcessRecord;
use thiserror::Error;

/// Failure reported by a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Persisting the event log failed
    #[error("Event log write failed: {0}")]
    EventLog(String),

    /// Metrics aggregation failed
    #[error("Metrics collection failed: {0}")]
    Metrics(String),
}

/// Receives the chronological event log
pub trait EventLogSink {
    fn flush(&mut self, events: &[ScheduleEvent]) -> Result<(), SinkError>;
}

/// Receives the final process pool and clock
pub trait MetricsCollector {
    fn collect(&mut self, processes: &[ProcessRecord], final_clock: u64) -> Result<(), SinkError>;
}

/// Keeps flushed events in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    events: Vec<ScheduleEvent>,
    flushes: usize,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    /// Number of flush calls received
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl EventLogSink for MemoryEventLog {
    fn flush(&mut self, events: &[ScheduleEvent]) -> Result<(), SinkError> {
        self.events.extend_from_slice(events);
        self.flushes += 1;
        Ok(())
    }
}
