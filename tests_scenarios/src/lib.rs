//! Scenario Test Utilities
//!
//! Shared builders and invariant checks for the cross-crate scenario tests.
//!
//! ## Test Philosophy
//!
//! - **Bounded loops**: Tests step the scheduler with an explicit iteration
//!   cap, so a regression shows up as a failure instead of a hang
//! - **Invariants at every step**: Ownership and CPU conservation are
//!   checked between iterations, not only at the end
//! - **Deterministic workloads**: Generated workloads come from a fixed
//!   seed and are reproducible

use core_types::Pid;
use services_config::{ProcessDescriptor, SchedulerSettings, SimulationConfig};
use services_logger::{NullLogSink, SharedLogSink};
use sim_scheduler::{DrainReason, Scheduler, SchedulerError};

/// Settings with the four tunables set and everything else defaulted
pub fn settings(
    time_quantum: u64,
    max_priority: u32,
    aging_threshold: u64,
    context_switch_time: u64,
) -> SchedulerSettings {
    SchedulerSettings {
        time_quantum,
        max_priority,
        aging_threshold,
        context_switch_time,
        ..SchedulerSettings::default()
    }
}

/// Builds a scheduler that discards its logs
pub fn build_scheduler(
    settings: SchedulerSettings,
    processes: Vec<ProcessDescriptor>,
) -> Result<Scheduler, String> {
    let config = SimulationConfig::new(settings, processes).map_err(|e| e.to_string())?;
    Scheduler::new(&config, Box::new(NullLogSink)).map_err(|e| e.to_string())
}

/// Builds a scheduler whose logs stay readable through the returned handle
pub fn build_with_log(
    settings: SchedulerSettings,
    processes: Vec<ProcessDescriptor>,
) -> Result<(Scheduler, SharedLogSink), String> {
    let log = SharedLogSink::new();
    let config = SimulationConfig::new(settings, processes).map_err(|e| e.to_string())?;
    let scheduler =
        Scheduler::new(&config, Box::new(log.clone())).map_err(|e| e.to_string())?;
    Ok((scheduler, log))
}

/// Steps the scheduler at most `max_steps` times, checking invariants
/// between iterations
///
/// Returns `Ok(None)` if the run has not drained within the cap.
pub fn run_checked(
    scheduler: &mut Scheduler,
    max_steps: usize,
) -> Result<Option<DrainReason>, SchedulerError> {
    for _ in 0..max_steps {
        assert_invariants(scheduler);
        let before = scheduler.clock();
        let outcome = scheduler.step()?;
        assert!(scheduler.clock() >= before, "clock moved backwards");
        if outcome.is_some() {
            assert_invariants(scheduler);
            return Ok(outcome);
        }
    }
    Ok(None)
}

/// Asserts single ownership and CPU conservation for every process
pub fn assert_invariants(scheduler: &Scheduler) {
    let max_priority = scheduler.settings().max_priority;
    let io_waiting = scheduler.io_waiting();

    for record in scheduler.processes() {
        let pid = record.pid();
        assert_eq!(
            record.total_cpu_used() + record.remaining_time(),
            record.burst_time(),
            "{pid} created or lost CPU time"
        );
        assert!(
            (1..=max_priority).contains(&record.priority()),
            "{pid} priority {} out of range",
            record.priority()
        );

        let mut owners = 0;
        for level in 1..=max_priority {
            let here = count(&scheduler.ready_sequence(level), pid);
            if here > 0 {
                assert_eq!(level, record.priority(), "{pid} queued at level {level}");
            }
            owners += here;
        }
        owners += count(&io_waiting, pid);

        let expected = usize::from(!record.is_finished());
        assert_eq!(owners, expected, "{pid} owned {owners} times");
    }
}

fn count(pids: &[Pid], pid: Pid) -> usize {
    pids.iter().filter(|&&p| p == pid).count()
}

/// Small deterministic generator for workload tests
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Next value in `low..=high`
    pub fn range(&mut self, low: u64, high: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        low + (self.0 >> 33) % (high - low + 1)
    }
}

/// Generates `count` processes with mixed priorities, bursts and I/O
pub fn generated_workload(seed: u64, count: u32, max_priority: u32) -> Vec<ProcessDescriptor> {
    let mut rng = Lcg::new(seed);
    (1..=count)
        .map(|pid| {
            let priority = rng.range(1, u64::from(max_priority)) as i64;
            let burst = rng.range(1, 30);
            let descriptor = ProcessDescriptor::new(pid, priority, burst);
            if rng.range(0, 2) == 0 {
                descriptor.with_io(rng.range(1, 6))
            } else {
                descriptor
            }
        })
        .collect()
}
