//! # Simulated CPU Scheduler
//!
//! Deterministic discrete-event simulation of CPU scheduling for a fixed
//! population of processes.
//!
//! ## Philosophy
//!
//! - **Deterministic**: The simulated clock only moves when the dispatch
//!   loop moves it. No wall-clock time, no real blocking.
//! - **Indices, not references**: Queues store [`ProcessIndex`] values into
//!   a pool that never resizes during a run.
//! - **Capabilities are injected**: Logging goes through a
//!   [`services_logger::LogSink`]; persistence and metrics are reached
//!   through the [`EventLogSink`] and [`MetricsCollector`] seams.
//!
//! ## Components
//!
//! - [`ProcessRecord`]: per-process state machine
//! - [`ReadyQueue`]: bounded FIFO per priority level
//! - [`IoWaitSet`]: processes counting down simulated I/O
//! - [`Scheduler`]: owns all of the above and runs the dispatch loop
//!
//! [`ProcessIndex`]: core_types::ProcessIndex

pub mod clock;
pub mod event;
pub mod io_wait;
pub mod monitor;
pub mod process;
pub mod ready_queue;
pub mod scheduler;
pub mod sinks;

pub use clock::SimClock;
pub use event::{EventKind, ScheduleEvent};
pub use io_wait::IoWaitSet;
pub use monitor::{spawn_dispatch_worker, DispatchWorker, SchedulerSnapshot, WorkerError};
pub use process::{ProcessRecord, ProcessState};
pub use ready_queue::{QueueError, ReadyQueue};
pub use scheduler::{DrainReason, Scheduler, SchedulerError, SchedulerPhase, StallDiagnostic};
pub use sinks::{EventLogSink, MemoryEventLog, MetricsCollector, SinkError};
