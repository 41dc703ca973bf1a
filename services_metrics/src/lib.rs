//! # Metrics Service
//!
//! Aggregates per-process and system-wide figures from a drained run.
//!
//! All processes arrive at time 0, so:
//!
//! - turnaround = completion time
//! - waiting = turnaround - CPU time - I/O time
//! - response = time of first dispatch
//! - CPU utilization = total CPU time / total time * 100
//! - throughput = processes / total time

use core_types::{Pid, RunId};
use serde::Serialize;
use serde_json::Value;
use services_event_log::{append_to_json_array, reset_json_array, EventLogError};
use sim_scheduler::{MetricsCollector, ProcessRecord, SinkError};
use std::path::Path;
use thiserror::Error;

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Metrics errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    /// Figures were requested before any run was collected
    #[error("Metrics not calculated yet")]
    NotCalculated,

    /// No process with this pid took part in the run
    #[error("No metrics for {0}")]
    ProcessNotFound(Pid),

    /// The process never finished, so its figures would be wrong
    #[error("{0} did not complete")]
    Incomplete(Pid),

    /// Writing the report failed
    #[error(transparent)]
    Persist(#[from] EventLogError),
}

/// Figures for one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessMetrics {
    pub pid: Pid,
    pub turnaround_time: u64,
    pub waiting_time: u64,
    pub response_time: u64,
    pub cpu_time_used: u64,
    pub io_time_used: u64,
    pub completion_time: u64,
}

impl ProcessMetrics {
    /// Derives the figures for a finished record
    pub fn from_record(record: &ProcessRecord) -> MetricsResult<Self> {
        let pid = record.pid();
        let (Some(completion), Some(response)) =
            (record.completion_time(), record.first_response_time())
        else {
            return Err(MetricsError::Incomplete(pid));
        };
        if record.has_remaining_work() {
            return Err(MetricsError::Incomplete(pid));
        }

        let cpu = record.total_cpu_used();
        let io = record.total_io_time();
        Ok(Self {
            pid,
            turnaround_time: completion,
            waiting_time: completion.saturating_sub(cpu + io),
            response_time: response,
            cpu_time_used: cpu,
            io_time_used: io,
            completion_time: completion,
        })
    }
}

/// Run-wide figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemMetrics {
    pub run_id: RunId,
    pub avg_turnaround_time: f64,
    pub avg_waiting_time: f64,
    pub avg_response_time: f64,
    pub cpu_utilization: f64,
    pub throughput: f64,
    pub total_time: u64,
    pub total_processes: usize,
    #[serde(rename = "process_metrics")]
    pub per_process: Vec<ProcessMetrics>,
}

fn average(total: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Computes and caches metrics for one run
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    run_id: RunId,
    cached: Option<SystemMetrics>,
}

impl MetricsAggregator {
    /// Creates an aggregator with a fresh run id
    pub fn new() -> Self {
        Self::with_run_id(RunId::new())
    }

    pub fn with_run_id(run_id: RunId) -> Self {
        Self {
            run_id,
            cached: None,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Computes metrics from the final pool and clock, replacing any cache
    pub fn calculate(
        &mut self,
        processes: &[ProcessRecord],
        total_time: u64,
    ) -> MetricsResult<&SystemMetrics> {
        let per_process = processes
            .iter()
            .map(ProcessMetrics::from_record)
            .collect::<MetricsResult<Vec<_>>>()?;

        let count = per_process.len();
        let sum = |f: fn(&ProcessMetrics) -> u64| per_process.iter().map(f).sum::<u64>();
        let total_cpu = sum(|m| m.cpu_time_used);

        let (cpu_utilization, throughput) = if total_time == 0 {
            (0.0, 0.0)
        } else {
            (
                total_cpu as f64 / total_time as f64 * 100.0,
                count as f64 / total_time as f64,
            )
        };

        let metrics = SystemMetrics {
            run_id: self.run_id,
            avg_turnaround_time: average(sum(|m| m.turnaround_time), count),
            avg_waiting_time: average(sum(|m| m.waiting_time), count),
            avg_response_time: average(sum(|m| m.response_time), count),
            cpu_utilization,
            throughput,
            total_time,
            total_processes: count,
            per_process,
        };
        Ok(&*self.cached.insert(metrics))
    }

    /// Returns the cached system metrics
    pub fn system(&self) -> MetricsResult<&SystemMetrics> {
        self.cached.as_ref().ok_or(MetricsError::NotCalculated)
    }

    /// Returns the cached figures for `pid`
    pub fn process(&self, pid: Pid) -> MetricsResult<&ProcessMetrics> {
        self.system()?
            .per_process
            .iter()
            .find(|m| m.pid == pid)
            .ok_or(MetricsError::ProcessNotFound(pid))
    }

    /// The report as a JSON value
    pub fn to_json(&self) -> MetricsResult<Value> {
        serde_json::to_value(self.system()?)
            .map_err(|e| EventLogError::Serialization(e.to_string()).into())
    }

    /// Writes `[report]` to `path`, replacing its content
    pub fn write_report(&self, path: impl AsRef<Path>) -> MetricsResult<()> {
        let report = self.to_json()?;
        let path = path.as_ref();
        reset_json_array(path)?;
        append_to_json_array(path, &report)?;
        Ok(())
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for MetricsAggregator {
    fn collect(&mut self, processes: &[ProcessRecord], final_clock: u64) -> Result<(), SinkError> {
        self.calculate(processes, final_clock)
            .map(|_| ())
            .map_err(|e| SinkError::Metrics(e.to_string()))
    }
}
