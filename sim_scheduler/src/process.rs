//! # Process Records
//!
//! A [`ProcessRecord`] holds one simulated process's mutable state and its
//! local state machine:
//!
//! ```text
//!   READY ──dispatch──▶ RUNNING ──remaining == 0──────────▶ FINISHED
//!     ▲                   │
//!     │                   ├──io budget used (I/O-bound)──▶ WAITING_IO
//!     │                   │                                    │
//!     └──quantum expired──┘◀──────────io countdown done────────┘
//! ```
//!
//! RUNNING only exists inside [`ProcessRecord::execute`]; between dispatch
//! steps a record is never observed in that state. The transition out of
//! WAITING_IO is driven by the I/O wait set, not by the record itself.

use core_types::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// Runnable and waiting in a ready queue
    Ready,
    /// Executing a slice (transient)
    Running,
    /// Blocked on simulated I/O
    WaitingIo,
    /// All CPU demand satisfied
    Finished,
}

impl ProcessState {
    /// Returns the upper-case name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::WaitingIo => "WAITING_IO",
            ProcessState::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulation state of one process (its PCB)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pid: Pid,
    priority: u32,
    priority_at_last_run: u32,
    burst_time: u64,
    remaining_time: u64,
    waiting_time: u64,
    is_io_bound: bool,
    io_interval: u64,
    io_remaining: u64,
    cpu_used_since_io: u64,
    total_cpu_used: u64,
    total_io_time: u64,
    completion_time: Option<u64>,
    first_response_time: Option<u64>,
    state: ProcessState,
    aging_threshold: u64,
    time_quantum: u64,
}

impl ProcessRecord {
    /// Creates a READY record with its full burst outstanding
    ///
    /// `aging_threshold` and `time_quantum` are the scheduler-wide values;
    /// they are copied in because configuration never changes mid-run.
    pub fn new(
        pid: Pid,
        priority: u32,
        burst_time: u64,
        is_io_bound: bool,
        io_interval: u64,
        aging_threshold: u64,
        time_quantum: u64,
    ) -> Self {
        Self {
            pid,
            priority,
            priority_at_last_run: priority,
            burst_time,
            remaining_time: burst_time,
            waiting_time: 0,
            is_io_bound,
            io_interval,
            io_remaining: 0,
            cpu_used_since_io: 0,
            total_cpu_used: 0,
            total_io_time: 0,
            completion_time: None,
            first_response_time: None,
            state: ProcessState::Ready,
            aging_threshold,
            time_quantum,
        }
    }

    /// CPU time the next call to [`execute`](Self::execute) would consume
    ///
    /// I/O-bound processes never run past the instant their I/O triggers.
    pub fn execution_bound(&self, quantum: u64) -> u64 {
        let bound = quantum.min(self.remaining_time);
        if self.is_io_bound {
            bound.min(self.io_interval.saturating_sub(self.cpu_used_since_io))
        } else {
            bound
        }
    }

    /// Runs the process for at most `quantum` units
    ///
    /// Returns the time actually consumed. A zero bound performs no
    /// mutation. Otherwise `waiting_time` restarts from 0 and the record
    /// ends in FINISHED, WAITING_IO (with the I/O countdown already
    /// started) or READY.
    pub fn execute(&mut self, quantum: u64) -> u64 {
        let elapsed = self.execution_bound(quantum);
        if elapsed == 0 {
            return 0;
        }

        self.state = ProcessState::Running;
        self.waiting_time = 0;
        self.remaining_time -= elapsed;
        self.cpu_used_since_io += elapsed;
        self.total_cpu_used += elapsed;

        if self.remaining_time == 0 {
            self.state = ProcessState::Finished;
        } else if self.is_io_bound && self.cpu_used_since_io >= self.io_interval {
            self.start_io();
        } else {
            self.state = ProcessState::Ready;
        }

        elapsed
    }

    /// Adds `delta` of waiting time and promotes one level once the
    /// threshold (`aging_threshold * time_quantum`) is reached
    ///
    /// Returns true on promotion. Priority 1 is the floor.
    pub fn age(&mut self, delta: u64) -> bool {
        self.waiting_time = self.waiting_time.saturating_add(delta);

        let threshold = self.aging_threshold.saturating_mul(self.time_quantum);
        if self.waiting_time >= threshold && self.priority > 1 {
            self.priority_at_last_run = self.priority;
            self.priority -= 1;
            self.waiting_time = 0;
            return true;
        }
        false
    }

    /// Blocks the process on I/O for `io_interval` units
    ///
    /// CPU time is already accounted in `total_cpu_used` as it is consumed,
    /// so only the per-burst counter is reset here.
    pub fn start_io(&mut self) {
        self.io_remaining = self.io_interval;
        self.cpu_used_since_io = 0;
        self.state = ProcessState::WaitingIo;
    }

    /// Counts down `delta` units of I/O
    ///
    /// Returns true once the countdown has reached 0. The time actually
    /// spent blocked is added to `total_io_time`.
    pub fn advance_io(&mut self, delta: u64) -> bool {
        let consumed = delta.min(self.io_remaining);
        self.io_remaining -= consumed;
        self.total_io_time += consumed;
        self.io_remaining == 0
    }

    /// Returns the process to READY after its I/O completes
    pub fn finish_io(&mut self) {
        self.io_remaining = 0;
        self.waiting_time = 0;
        self.state = ProcessState::Ready;
    }

    /// Records the time of the first dispatch; later calls are ignored
    pub fn record_first_response(&mut self, time: u64) {
        if self.first_response_time.is_none() {
            self.first_response_time = Some(time);
        }
    }

    /// Records the completion time once the burst is exhausted
    ///
    /// Has no effect while work remains or if already set.
    pub fn set_completion(&mut self, time: u64) {
        if self.remaining_time == 0 && self.completion_time.is_none() {
            self.completion_time = Some(time);
        }
    }

    /// Overrides the current priority
    pub fn set_priority(&mut self, priority: u32) {
        self.priority = priority;
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Priority held before the most recent promotion
    pub fn priority_at_last_run(&self) -> u32 {
        self.priority_at_last_run
    }

    pub fn burst_time(&self) -> u64 {
        self.burst_time
    }

    pub fn remaining_time(&self) -> u64 {
        self.remaining_time
    }

    pub fn waiting_time(&self) -> u64 {
        self.waiting_time
    }

    pub fn is_io_bound(&self) -> bool {
        self.is_io_bound
    }

    pub fn io_interval(&self) -> u64 {
        self.io_interval
    }

    pub fn io_remaining(&self) -> u64 {
        self.io_remaining
    }

    pub fn cpu_used_since_io(&self) -> u64 {
        self.cpu_used_since_io
    }

    pub fn total_cpu_used(&self) -> u64 {
        self.total_cpu_used
    }

    pub fn total_io_time(&self) -> u64 {
        self.total_io_time
    }

    pub fn completion_time(&self) -> Option<u64> {
        self.completion_time
    }

    pub fn first_response_time(&self) -> Option<u64> {
        self.first_response_time
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == ProcessState::Finished
    }

    pub fn is_waiting_io(&self) -> bool {
        self.state == ProcessState::WaitingIo
    }

    pub fn has_remaining_work(&self) -> bool {
        self.remaining_time > 0
    }
}

impl fmt::Display for ProcessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} prio:{} burst:{} remain:{} waited:{} io_bound:{} io_interval:{} cpu_used:{} state:{}}}",
            self.pid,
            self.priority,
            self.burst_time,
            self.remaining_time,
            self.waiting_time,
            self.is_io_bound,
            self.io_interval,
            self.cpu_used_since_io,
            self.state
        )
    }
}
