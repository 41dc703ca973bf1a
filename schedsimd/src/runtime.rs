//! # Simulation Runtime
//!
//! Wires configuration, the dispatch worker and the output files together.

use core_types::RunId;
use crossbeam_channel::unbounded;
use services_config::{ConfigError, SimulationConfig};
use services_event_log::{EventLogError, JsonFileEventSink};
use services_logger::{LogLevel, StderrLogSink};
use services_metrics::{MetricsAggregator, MetricsError, SystemMetrics};
use sim_scheduler::{
    spawn_dispatch_worker, DrainReason, EventLogSink, Scheduler, SchedulerError,
    SchedulerSnapshot, SinkError, WorkerError,
};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Runtime error types
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Output error: {0}")]
    Sink(#[from] SinkError),

    #[error("Cannot create log directory {path}: {message}")]
    LogDir { path: PathBuf, message: String },
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Simulation configuration file
    pub config_path: PathBuf,
    /// Directory receiving the output files
    pub log_dir: PathBuf,
    /// Base name of the output files
    pub name: String,
    /// Minimum level written to stderr
    pub log_level: LogLevel,
    /// Whether to stream snapshots while the run progresses
    pub monitor: bool,
}

impl RuntimeConfig {
    /// Creates a configuration with default outputs
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            log_dir: PathBuf::from("logs"),
            name: "schedule".to_string(),
            log_level: LogLevel::Warn,
            monitor: false,
        }
    }

    /// Path of the event log
    pub fn events_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.json", self.name))
    }

    /// Path of the metrics report
    pub fn metrics_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}_metrics.json", self.name))
    }
}

/// Outcome of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub reason: DrainReason,
    /// Final simulated time
    pub clock: u64,
    pub dispatches: u64,
    pub context_switches: u64,
    pub events_path: PathBuf,
    /// Set only when every process completed
    pub metrics_path: Option<PathBuf>,
    pub metrics: Option<SystemMetrics>,
}

impl RunReport {
    pub fn completed(&self) -> bool {
        self.reason == DrainReason::Completed
    }
}

/// Simulation runtime
pub struct SimRuntime {
    config: RuntimeConfig,
    simulation: SimulationConfig,
}

impl SimRuntime {
    /// Loads and validates the simulation configuration
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let simulation = SimulationConfig::load_from_path(&config.config_path)?;
        Ok(Self { config, simulation })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn simulation(&self) -> &SimulationConfig {
        &self.simulation
    }

    /// Runs the simulation to its end and writes the output files
    ///
    /// `on_snapshot` is called from the calling thread for every snapshot
    /// when monitoring is enabled.
    pub fn run(
        &self,
        mut on_snapshot: impl FnMut(&SchedulerSnapshot),
    ) -> Result<RunReport, RuntimeError> {
        fs::create_dir_all(&self.config.log_dir).map_err(|e| RuntimeError::LogDir {
            path: self.config.log_dir.clone(),
            message: e.to_string(),
        })?;

        let log = StderrLogSink::new(self.config.log_level);
        let mut scheduler = Scheduler::new(&self.simulation, Box::new(log))?;

        let (tx, rx) = unbounded();
        if self.config.monitor {
            scheduler = scheduler.with_monitor(tx);
        } else {
            drop(tx);
        }

        let worker = spawn_dispatch_worker(scheduler)?;
        for snapshot in rx.iter() {
            on_snapshot(&snapshot);
        }
        let (mut scheduler, reason) = worker.join()?;

        let events_path = self.config.events_path();
        let mut event_log = JsonFileEventSink::create(&events_path)?;
        let mut aggregator = MetricsAggregator::new();

        let (metrics_path, metrics) = if reason == DrainReason::Completed {
            scheduler.run_to_completion(&mut event_log, &mut aggregator)?;
            let path = self.config.metrics_path();
            aggregator.write_report(&path)?;
            (Some(path), Some(aggregator.system()?.clone()))
        } else {
            event_log.flush(scheduler.events())?;
            (None, None)
        };

        Ok(RunReport {
            run_id: aggregator.run_id(),
            reason,
            clock: scheduler.clock(),
            dispatches: scheduler.dispatch_count(),
            context_switches: scheduler.context_switches(),
            events_path,
            metrics_path,
            metrics,
        })
    }
}
