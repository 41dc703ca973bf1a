//! # Worker and Monitor Support
//!
//! The dispatch loop is single-threaded. A host that must stay responsive
//! moves the whole [`Scheduler`] onto a worker thread with
//! [`spawn_dispatch_worker`] and gets it back from [`DispatchWorker::join`].
//!
//! Observers never touch the live structures. They receive immutable
//! [`SchedulerSnapshot`] values over a crossbeam channel registered with
//! [`Scheduler::with_monitor`], one per loop iteration plus a final one
//! when the run drains.

use crate::scheduler::{DrainReason, Scheduler, SchedulerError, SchedulerPhase};
use core_types::Pid;
use serde::Serialize;
use std::fmt;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Name given to the dispatch thread
pub const WORKER_THREAD_NAME: &str = "sched-dispatch";

/// Scheduler state between two iterations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerSnapshot {
    /// Loop iterations so far
    pub step: u64,
    pub clock: u64,
    pub phase: SchedulerPhase,
    pub last_run: Option<Pid>,
    /// Ready queues head to tail; entry 0 is priority 1
    pub ready: Vec<Vec<Pid>>,
    pub io_waiting: Vec<Pid>,
    /// Number of finished processes
    pub finished: usize,
}

impl fmt::Display for SchedulerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} clock {}", self.step, self.clock)?;
        if let Some(pid) = self.last_run {
            write!(f, " ran {}", pid)?;
        }
        for (level, queue) in self.ready.iter().enumerate() {
            write!(f, " | p{}:{}", level + 1, queue.len())?;
        }
        write!(f, " | io:{} done:{}", self.io_waiting.len(), self.finished)
    }
}

/// Worker thread failures
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The OS refused to start the thread
    #[error("Failed to spawn dispatch worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The dispatch loop panicked
    #[error("Dispatch worker panicked")]
    Panicked,

    /// The dispatch loop returned an error
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

type WorkerResult = (Scheduler, Result<DrainReason, SchedulerError>);

/// Handle to a scheduler running on its own thread
pub struct DispatchWorker {
    handle: JoinHandle<WorkerResult>,
}

impl DispatchWorker {
    /// Waits for the run to drain and returns the scheduler with its outcome
    pub fn join(self) -> Result<(Scheduler, DrainReason), WorkerError> {
        let (scheduler, result) = self.handle.join().map_err(|_| WorkerError::Panicked)?;
        Ok((scheduler, result?))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Moves `scheduler` onto a named thread and runs it until it drains
///
/// The monitor channel is detached when the run ends, so a receiver can
/// simply iterate until disconnection.
pub fn spawn_dispatch_worker(mut scheduler: Scheduler) -> Result<DispatchWorker, WorkerError> {
    let handle = thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            let result = scheduler.run();
            scheduler.detach_monitor();
            (scheduler, result)
        })?;
    Ok(DispatchWorker { handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use services_config::{ProcessDescriptor, SchedulerSettings, SimulationConfig};
    use services_logger::NullLogSink;

    fn config() -> SimulationConfig {
        SimulationConfig::new(
            SchedulerSettings::default(),
            vec![
                ProcessDescriptor::new(1, 1, 6),
                ProcessDescriptor::new(2, 2, 5).with_io(2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_snapshots_follow_every_iteration() {
        let (tx, rx) = unbounded();
        let mut scheduler = Scheduler::new(&config(), Box::new(NullLogSink))
            .unwrap()
            .with_monitor(tx);

        let reason = scheduler.run().unwrap();
        assert_eq!(reason, DrainReason::Completed);

        let snapshots: Vec<SchedulerSnapshot> = rx.try_iter().collect();
        // one per iteration plus the drain snapshot
        assert_eq!(snapshots.len() as u64, scheduler.steps() + 1);

        let last = snapshots.last().unwrap();
        assert_eq!(last.phase, SchedulerPhase::Drained);
        assert_eq!(last.finished, 2);
        assert_eq!(last.clock, scheduler.clock());
        assert_eq!(last.ready.len(), 3);

        for pair in snapshots.windows(2) {
            assert!(pair[0].clock <= pair[1].clock);
            assert!(pair[0].step <= pair[1].step);
        }
    }

    #[test]
    fn test_disconnected_monitor_is_ignored() {
        let (tx, rx) = unbounded();
        drop(rx);
        let mut scheduler = Scheduler::new(&config(), Box::new(NullLogSink))
            .unwrap()
            .with_monitor(tx);
        assert_eq!(scheduler.run().unwrap(), DrainReason::Completed);
    }

    #[test]
    fn test_worker_runs_to_drain() {
        let (tx, rx) = unbounded();
        let scheduler = Scheduler::new(&config(), Box::new(NullLogSink))
            .unwrap()
            .with_monitor(tx);

        let worker = spawn_dispatch_worker(scheduler).unwrap();
        // ends once the worker detaches its sender
        let snapshots: Vec<SchedulerSnapshot> = rx.iter().collect();
        let (scheduler, reason) = worker.join().unwrap();

        assert_eq!(reason, DrainReason::Completed);
        assert!(scheduler.processes().iter().all(|p| p.is_finished()));
        assert_eq!(snapshots.last().unwrap().phase, SchedulerPhase::Drained);
        assert_eq!(snapshots.len() as u64, scheduler.steps() + 1);
    }

    #[test]
    fn test_snapshot_display() {
        let snapshot = SchedulerSnapshot {
            step: 3,
            clock: 12,
            phase: SchedulerPhase::Dispatching,
            last_run: Some(Pid::new(2)),
            ready: vec![vec![Pid::new(1)], vec![]],
            io_waiting: vec![Pid::new(4)],
            finished: 1,
        };
        assert_eq!(
            snapshot.to_string(),
            "step 3 clock 12 ran pid:2 | p1:1 | p2:0 | io:1 done:1"
        );
    }
}
