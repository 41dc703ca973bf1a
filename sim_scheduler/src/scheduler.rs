//! # Dispatch Scheduler
//!
//! Hybrid priority + round-robin + aging scheduler over a fixed process
//! pool, with simulated blocking I/O.
//!
//! ## Philosophy
//!
//! - **Determinism first**: Same configuration => same schedule, same log.
//! - **Exclusive ownership**: The scheduler alone mutates the pool, the
//!   ready queues and the I/O wait set. Queues hold [`ProcessIndex`]
//!   values, never references.
//! - **Progress or diagnosis**: The loop either makes progress, finishes,
//!   or stops with a [`StallDiagnostic`]. It never spins.
//!
//! ## Lifecycle
//!
//! `SEEDING → DISPATCHING → DRAINED`. Seeding happens inside
//! [`Scheduler::new`], so a constructed scheduler is always dispatching
//! until it drains.
//!
//! ## One dispatch iteration
//!
//! 1. Drain check: no remaining work and no blocked I/O finishes the run.
//!    With every ready queue empty the clock fast-forwards to the next I/O
//!    completion; if that cannot make progress the run stalls.
//! 2. Pop the head of the most urgent non-empty level.
//! 3. Charge `context_switch_time` if the process differs from the last one.
//! 4. Count I/O down by the time elapsed since the last iteration ended.
//! 5. Record the first response, execute one bounded slice and count I/O
//!    down by the slice length.
//! 6. Route the process: back to the tail of its level, into the I/O wait
//!    set, or to completion.
//! 7. Age every other queued process by the iteration's span, promoting
//!    into the next level when the threshold is reached.
//! 8. Record a [`ScheduleEvent`].
//!
//! Processes leaving I/O during an iteration are queued in that iteration
//! but only become eligible for selection in the next one.

use crate::clock::SimClock;
use crate::event::ScheduleEvent;
use crate::io_wait::IoWaitSet;
use crate::monitor::SchedulerSnapshot;
use crate::process::{ProcessRecord, ProcessState};
use crate::ready_queue::{QueueError, ReadyQueue};
use crate::sinks::{EventLogSink, MetricsCollector, SinkError};
use core_types::{Pid, ProcessIndex};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use services_config::{ProcessDescriptor, SchedulerSettings, SimulationConfig};
use services_logger::{LogEntry, LogLevel, LogSink};
use thiserror::Error;

/// Fatal scheduler errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// More processes than the configured pool capacity
    #[error("Process count {count} exceeds capacity {capacity}")]
    CapacityExceeded { count: usize, capacity: usize },

    /// A ready queue was used outside its protocol
    #[error("Ready queue protocol violation at priority {priority}: {source}")]
    QueueProtocol {
        priority: u32,
        #[source]
        source: QueueError,
    },

    /// A drain collaborator failed
    #[error("Drain hand-off failed: {0}")]
    Sink(#[from] SinkError),
}

/// Scheduler lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPhase {
    /// Dispatch loop is running
    Dispatching,
    /// Run has ended; see [`DrainReason`]
    Drained,
}

/// Why the dispatch loop stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrainReason {
    /// Every process finished
    Completed,
    /// Unfinished work exists but nothing can make progress
    Stalled(StallDiagnostic),
    /// The configured iteration guard was hit
    StepLimitReached { limit: u64 },
}

/// State captured when a stall is detected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallDiagnostic {
    /// Simulated time of detection
    pub clock: u64,
    /// Processes with remaining work
    pub unfinished: Vec<Pid>,
    /// Processes blocked on I/O
    pub io_waiting: Vec<Pid>,
}

/// The dispatch loop and everything it owns
pub struct Scheduler {
    settings: SchedulerSettings,
    pool: Vec<ProcessRecord>,
    /// One queue per priority level; slot 0 is priority 1
    ready: Vec<ReadyQueue>,
    io: IoWaitSet,
    clock: SimClock,
    last_tick: u64,
    last_run: Option<Pid>,
    steps: u64,
    dispatch_count: u64,
    context_switches: u64,
    phase: SchedulerPhase,
    drain_reason: Option<DrainReason>,
    events: Vec<ScheduleEvent>,
    log: Box<dyn LogSink + Send>,
    monitor: Option<Sender<SchedulerSnapshot>>,
}

impl Scheduler {
    /// Builds the pool from a validated configuration and seeds the queues
    pub fn new(
        config: &SimulationConfig,
        log: Box<dyn LogSink + Send>,
    ) -> Result<Self, SchedulerError> {
        Self::seed(config.scheduler(), config.processes(), log)
    }

    fn seed(
        settings: &SchedulerSettings,
        descriptors: &[ProcessDescriptor],
        log: Box<dyn LogSink + Send>,
    ) -> Result<Self, SchedulerError> {
        if descriptors.len() > settings.max_processes {
            return Err(SchedulerError::CapacityExceeded {
                count: descriptors.len(),
                capacity: settings.max_processes,
            });
        }

        let ready = (0..settings.max_priority)
            .map(|_| ReadyQueue::with_capacity(settings.max_processes))
            .collect();

        let mut scheduler = Self {
            settings: settings.clone(),
            pool: Vec::with_capacity(descriptors.len()),
            ready,
            io: IoWaitSet::new(),
            clock: SimClock::new(),
            last_tick: 0,
            last_run: None,
            steps: 0,
            dispatch_count: 0,
            context_switches: 0,
            phase: SchedulerPhase::Dispatching,
            drain_reason: None,
            events: Vec::new(),
            log,
            monitor: None,
        };

        for descriptor in descriptors {
            let priority = scheduler.clamp_priority(descriptor);
            let index = ProcessIndex::new(scheduler.pool.len());
            scheduler.pool.push(ProcessRecord::new(
                descriptor.pid,
                priority,
                descriptor.burst_time,
                descriptor.io_bound,
                descriptor.io_interval,
                settings.aging_threshold,
                settings.time_quantum,
            ));
            scheduler.enqueue_ready(priority, index)?;
        }

        scheduler.log(
            LogEntry::new(LogLevel::Info, "Scheduler seeded")
                .with_field("processes", scheduler.pool.len())
                .with_field("levels", settings.max_priority)
                .with_field("quantum", settings.time_quantum),
        );

        Ok(scheduler)
    }

    fn clamp_priority(&mut self, descriptor: &ProcessDescriptor) -> u32 {
        let max = i64::from(self.settings.max_priority);
        let clamped = descriptor.priority.clamp(1, max);
        if clamped != descriptor.priority {
            self.log(
                LogEntry::new(LogLevel::Warn, "Priority out of range, clamped")
                    .with_source(descriptor.pid)
                    .with_field("requested", descriptor.priority)
                    .with_field("priority", clamped),
            );
        }
        // clamped into 1..=max_priority, which fits in u32
        clamped as u32
    }

    /// Sends a snapshot after every iteration
    ///
    /// A disconnected receiver is ignored.
    pub fn with_monitor(mut self, monitor: Sender<SchedulerSnapshot>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Drops the monitor channel, ending the receiver's iteration
    pub fn detach_monitor(&mut self) {
        self.monitor = None;
    }

    /// Runs until the loop drains
    pub fn run(&mut self) -> Result<DrainReason, SchedulerError> {
        loop {
            if let Some(reason) = self.step()? {
                return Ok(reason);
            }
        }
    }

    /// Runs, then hands the event log and the final pool to the collaborators
    pub fn run_to_completion(
        &mut self,
        event_log: &mut dyn EventLogSink,
        metrics: &mut dyn MetricsCollector,
    ) -> Result<DrainReason, SchedulerError> {
        let reason = self.run()?;
        event_log.flush(&self.events)?;
        metrics.collect(&self.pool, self.clock.now())?;
        self.log(
            LogEntry::new(LogLevel::Debug, "Drain hand-off complete")
                .with_field("events", self.events.len()),
        );
        Ok(reason)
    }

    /// Performs one loop iteration
    ///
    /// Returns the drain reason once the run has ended; further calls keep
    /// returning it without doing work.
    pub fn step(&mut self) -> Result<Option<DrainReason>, SchedulerError> {
        if let Some(reason) = &self.drain_reason {
            return Ok(Some(reason.clone()));
        }

        let has_work = self.pool.iter().any(ProcessRecord::has_remaining_work);
        if !has_work && self.io.is_empty() {
            return Ok(Some(self.drain(DrainReason::Completed)));
        }

        if let Some(limit) = self.settings.max_dispatch_steps {
            if self.steps >= limit {
                return Ok(Some(self.drain(DrainReason::StepLimitReached { limit })));
            }
        }
        self.steps += 1;

        match self.highest_ready_level() {
            Some(priority) => self.dispatch(priority)?,
            None if self.io.is_empty() => return Ok(Some(self.stall())),
            None => {
                if !self.fast_forward()? {
                    return Ok(Some(self.stall()));
                }
            }
        }

        self.publish_snapshot();
        Ok(None)
    }

    fn highest_ready_level(&self) -> Option<u32> {
        self.ready
            .iter()
            .position(|queue| !queue.is_empty())
            .map(|slot| slot as u32 + 1)
    }

    /// Jumps the clock to the next I/O completion
    ///
    /// Returns false if no blocked process could be released.
    fn fast_forward(&mut self) -> Result<bool, SchedulerError> {
        let Some(wait) = self.io.min_remaining(&self.pool) else {
            return Ok(false);
        };

        self.clock.advance(wait);
        self.io.tick(&mut self.pool, wait);
        let released = self.release_finished_io()?;
        self.last_tick = self.clock.now();

        self.log(
            LogEntry::new(LogLevel::Debug, "Fast-forwarded through I/O stall")
                .with_field("wait", wait)
                .with_field("clock", self.clock.now())
                .with_field("released", released),
        );
        Ok(released > 0)
    }

    /// Counts I/O down by `delta` and requeues completed processes
    fn advance_io(&mut self, delta: u64) -> Result<(), SchedulerError> {
        if delta > 0 {
            self.io.tick(&mut self.pool, delta);
            self.release_finished_io()?;
        }
        Ok(())
    }

    fn release_finished_io(&mut self) -> Result<usize, SchedulerError> {
        let finished = self.io.drain_finished(&mut self.pool);
        for &index in &finished {
            let record = &self.pool[index.get()];
            let (pid, priority) = (record.pid(), record.priority());
            if record.has_remaining_work() {
                self.enqueue_ready(priority, index)?;
            }
            self.log(
                LogEntry::new(LogLevel::Debug, "I/O complete")
                    .with_source(pid)
                    .with_field("clock", self.clock.now()),
            );
        }
        Ok(finished.len())
    }

    fn dispatch(&mut self, priority: u32) -> Result<(), SchedulerError> {
        let index = self
            .queue_mut(priority)
            .pop()
            .map_err(|source| SchedulerError::QueueProtocol { priority, source })?;
        let pid = self.pool[index.get()].pid();

        if self.last_run.is_some_and(|last| last != pid) {
            self.clock.advance(self.settings.context_switch_time);
            self.context_switches += 1;
        }

        let gap = self.clock.since(self.last_tick);
        self.advance_io(gap)?;

        let now = self.clock.now();
        let record = &mut self.pool[index.get()];
        record.record_first_response(now);
        let waited = record.waiting_time();
        let elapsed = record.execute(self.settings.time_quantum);
        self.clock.advance(elapsed);

        // the slice itself also counts down I/O for processes already blocked
        self.advance_io(elapsed)?;

        let now = self.clock.now();
        match self.pool[index.get()].state() {
            ProcessState::WaitingIo => self.io.enqueue(index),
            ProcessState::Ready if elapsed > 0 => self.enqueue_ready(priority, index)?,
            ProcessState::Finished => {
                self.pool[index.get()].set_completion(now);
                self.log(
                    LogEntry::new(LogLevel::Info, "Process finished")
                        .with_source(pid)
                        .with_field("completion", now),
                );
            }
            _ => {}
        }

        let span = self.clock.since(self.last_tick);
        self.age_waiting(index, span)?;

        self.last_tick = now;
        self.last_run = Some(pid);
        self.dispatch_count += 1;

        let event = ScheduleEvent::from_record(&self.pool[index.get()], waited, now);
        if self.log.enabled(LogLevel::Debug) {
            self.log(
                LogEntry::new(LogLevel::Debug, "Executed slice")
                    .with_source(pid)
                    .with_field("elapsed", elapsed)
                    .with_field("event", event.event)
                    .with_field("remaining", event.remaining_time)
                    .with_field("clock", now),
            );
        }
        self.events.push(event);
        Ok(())
    }

    /// Ages every queued process other than `ran`
    fn age_waiting(&mut self, ran: ProcessIndex, span: u64) -> Result<(), SchedulerError> {
        for slot in 0..self.pool.len() {
            let index = ProcessIndex::new(slot);
            if index == ran {
                continue;
            }

            let record = &self.pool[slot];
            if !record.has_remaining_work() || record.is_waiting_io() {
                continue;
            }
            if !self.queue(record.priority()).contains(index) {
                continue;
            }

            let record = &mut self.pool[slot];
            if !record.age(span) {
                continue;
            }

            let (from, to, pid) = (
                record.priority_at_last_run(),
                record.priority(),
                record.pid(),
            );
            self.queue_mut(from).remove(index);
            self.enqueue_ready(to, index)?;
            self.log(
                LogEntry::new(LogLevel::Debug, "Aging promotion")
                    .with_source(pid)
                    .with_field("from", from)
                    .with_field("to", to),
            );
        }
        Ok(())
    }

    fn stall(&mut self) -> DrainReason {
        let diagnostic = StallDiagnostic {
            clock: self.clock.now(),
            unfinished: self
                .pool
                .iter()
                .filter(|record| record.has_remaining_work())
                .map(ProcessRecord::pid)
                .collect(),
            io_waiting: self.io_waiting(),
        };
        self.log(
            LogEntry::new(LogLevel::Error, "Stall detected, no process can make progress")
                .with_field("clock", diagnostic.clock)
                .with_field("unfinished", diagnostic.unfinished.len())
                .with_field("io_waiting", diagnostic.io_waiting.len()),
        );
        self.drain(DrainReason::Stalled(diagnostic))
    }

    fn drain(&mut self, reason: DrainReason) -> DrainReason {
        self.phase = SchedulerPhase::Drained;
        self.drain_reason = Some(reason.clone());
        let outcome = match &reason {
            DrainReason::Completed => "completed",
            DrainReason::Stalled(_) => "stalled",
            DrainReason::StepLimitReached { .. } => "step_limit",
        };
        self.log(
            LogEntry::new(LogLevel::Info, "Scheduler drained")
                .with_field("reason", outcome)
                .with_field("clock", self.clock.now())
                .with_field("dispatches", self.dispatch_count),
        );
        self.publish_snapshot();
        reason
    }

    fn enqueue_ready(&mut self, priority: u32, index: ProcessIndex) -> Result<(), SchedulerError> {
        self.queue_mut(priority)
            .push(index)
            .map_err(|source| SchedulerError::QueueProtocol { priority, source })
    }

    fn queue(&self, priority: u32) -> &ReadyQueue {
        &self.ready[priority as usize - 1]
    }

    fn queue_mut(&mut self, priority: u32) -> &mut ReadyQueue {
        &mut self.ready[priority as usize - 1]
    }

    fn log(&mut self, entry: LogEntry) {
        if self.log.enabled(entry.level) {
            self.log.log(entry);
        }
    }

    fn publish_snapshot(&self) {
        if let Some(monitor) = &self.monitor {
            let _ = monitor.send(self.snapshot());
        }
    }

    /// Immutable view of the current state
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            step: self.steps,
            clock: self.clock.now(),
            phase: self.phase,
            last_run: self.last_run,
            ready: (1..=self.settings.max_priority)
                .map(|priority| self.ready_sequence(priority))
                .collect(),
            io_waiting: self.io_waiting(),
            finished: self.pool.iter().filter(|r| r.is_finished()).count(),
        }
    }

    /// Current simulated time
    pub fn clock(&self) -> u64 {
        self.clock.now()
    }

    /// Number of times the running process changed identity
    pub fn context_switches(&self) -> u64 {
        self.context_switches
    }

    /// Number of iterations that executed a process
    pub fn dispatch_count(&self) -> u64 {
        self.dispatch_count
    }

    /// Number of loop iterations, fast-forwards included
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn drain_reason(&self) -> Option<&DrainReason> {
        self.drain_reason.as_ref()
    }

    pub fn last_run(&self) -> Option<Pid> {
        self.last_run
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// The process pool, in configuration order
    pub fn processes(&self) -> &[ProcessRecord] {
        &self.pool
    }

    /// Looks up a process by pid
    pub fn process(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.pool.iter().find(|record| record.pid() == pid)
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    /// Pids queued at `priority`, head to tail; empty for unknown levels
    pub fn ready_sequence(&self, priority: u32) -> Vec<Pid> {
        if priority == 0 || priority > self.settings.max_priority {
            return Vec::new();
        }
        self.queue(priority)
            .iter()
            .map(|index| self.pool[index.get()].pid())
            .collect()
    }

    /// Pids blocked on I/O, in the order they blocked
    pub fn io_waiting(&self) -> Vec<Pid> {
        self.io
            .active()
            .iter()
            .map(|index| self.pool[index.get()].pid())
            .collect()
    }

    #[cfg(test)]
    fn clear_ready_queues(&mut self) {
        for queue in &mut self.ready {
            queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::sinks::MemoryEventLog;
    use services_logger::{NullLogSink, SharedLogSink};

    fn settings(quantum: u64, max_priority: u32, aging: u64, context_switch: u64) -> SchedulerSettings {
        SchedulerSettings {
            time_quantum: quantum,
            max_priority,
            aging_threshold: aging,
            context_switch_time: context_switch,
            ..SchedulerSettings::default()
        }
    }

    fn scheduler(settings: SchedulerSettings, processes: Vec<ProcessDescriptor>) -> Scheduler {
        let config = SimulationConfig::new(settings, processes).unwrap();
        Scheduler::new(&config, Box::new(NullLogSink)).unwrap()
    }

    fn pid(raw: u32) -> Pid {
        Pid::new(raw)
    }

    /// Every unfinished process sits in exactly one of its ready queue or
    /// the I/O wait set; finished ones sit in neither.
    fn assert_single_ownership(s: &Scheduler) {
        for record in s.processes() {
            let in_ready = (1..=s.settings().max_priority)
                .map(|p| {
                    let count = s.ready_sequence(p).iter().filter(|&&q| q == record.pid()).count();
                    if count > 0 {
                        assert_eq!(p, record.priority(), "{} queued at wrong level", record.pid());
                    }
                    count
                })
                .sum::<usize>();
            let in_io = s.io_waiting().iter().filter(|&&q| q == record.pid()).count();

            if record.is_finished() {
                assert_eq!(in_ready + in_io, 0, "{} finished but still queued", record.pid());
            } else {
                assert_eq!(in_ready + in_io, 1, "{} owned {} times", record.pid(), in_ready + in_io);
            }
        }
    }

    fn assert_conserved(s: &Scheduler) {
        for record in s.processes() {
            assert_eq!(record.total_cpu_used() + record.remaining_time(), record.burst_time());
        }
    }

    #[test]
    fn test_seeding_preserves_configuration_order() {
        let s = scheduler(
            settings(4, 3, 5, 0),
            vec![
                ProcessDescriptor::new(7, 2, 5),
                ProcessDescriptor::new(3, 1, 5),
                ProcessDescriptor::new(9, 2, 5),
            ],
        );

        assert_eq!(s.phase(), SchedulerPhase::Dispatching);
        assert_eq!(s.clock(), 0);
        assert_eq!(s.ready_sequence(1), vec![pid(3)]);
        assert_eq!(s.ready_sequence(2), vec![pid(7), pid(9)]);
        assert!(s.ready_sequence(3).is_empty());
        assert!(s.ready_sequence(0).is_empty());
        assert!(s.ready_sequence(4).is_empty());
        assert_single_ownership(&s);
    }

    #[test]
    fn test_out_of_range_priority_is_clamped_with_warning() {
        let log = SharedLogSink::new();
        let config = SimulationConfig::new(
            settings(4, 3, 5, 0),
            vec![
                ProcessDescriptor::new(1, 9, 5),
                ProcessDescriptor::new(2, 0, 5),
                ProcessDescriptor::new(3, 2, 5),
            ],
        )
        .unwrap();
        let s = Scheduler::new(&config, Box::new(log.clone())).unwrap();

        assert_eq!(s.process(pid(1)).unwrap().priority(), 3);
        assert_eq!(s.process(pid(2)).unwrap().priority(), 1);
        assert_eq!(s.process(pid(3)).unwrap().priority(), 2);

        let warnings = log.entries_at(LogLevel::Warn);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].source, Some(pid(1)));
        assert_eq!(warnings[0].field("requested"), Some("9"));
        assert_eq!(warnings[0].field("priority"), Some("3"));
        assert_eq!(warnings[1].source, Some(pid(2)));
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut small = settings(4, 3, 5, 0);
        small.max_processes = 1;
        let descriptors = vec![ProcessDescriptor::new(1, 1, 5), ProcessDescriptor::new(2, 1, 5)];

        let result = Scheduler::seed(&small, &descriptors, Box::new(NullLogSink));
        assert!(matches!(
            result,
            Err(SchedulerError::CapacityExceeded { count: 2, capacity: 1 })
        ));
    }

    #[test]
    fn test_single_cpu_bound_process() {
        let mut s = scheduler(settings(4, 3, 5, 0), vec![ProcessDescriptor::new(1, 1, 10)]);

        assert_eq!(s.run().unwrap(), DrainReason::Completed);
        assert_eq!(s.phase(), SchedulerPhase::Drained);

        let slices: Vec<u64> = s.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(slices, vec![4, 8, 10]);
        let kinds: Vec<EventKind> = s.events().iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![EventKind::Running, EventKind::Running, EventKind::Finished]);

        let record = s.process(pid(1)).unwrap();
        assert_eq!(record.completion_time(), Some(10));
        assert_eq!(record.first_response_time(), Some(0));
        assert_eq!(s.clock(), 10);
        assert_eq!(s.dispatch_count(), 3);
        assert_eq!(s.context_switches(), 0);
    }

    #[test]
    fn test_single_io_bound_process() {
        let mut s = scheduler(
            settings(4, 3, 5, 0),
            vec![ProcessDescriptor::new(2, 1, 5).with_io(2)],
        );

        // first slice stops at the I/O interval
        assert_eq!(s.step().unwrap(), None);
        let record = s.process(pid(2)).unwrap();
        assert_eq!(s.clock(), 2);
        assert_eq!(record.state(), ProcessState::WaitingIo);
        assert_eq!(record.io_remaining(), 2);
        assert_eq!(record.remaining_time(), 3);
        assert_eq!(s.io_waiting(), vec![pid(2)]);

        // nothing ready: the clock jumps to the I/O completion
        assert_eq!(s.step().unwrap(), None);
        let record = s.process(pid(2)).unwrap();
        assert_eq!(s.clock(), 4);
        assert_eq!(record.state(), ProcessState::Ready);
        assert_eq!(s.ready_sequence(1), vec![pid(2)]);

        // each slice is still capped by the I/O interval after the reset
        assert_eq!(s.step().unwrap(), None);
        assert_eq!(s.process(pid(2)).unwrap().remaining_time(), 1);
        assert_eq!(s.process(pid(2)).unwrap().state(), ProcessState::WaitingIo);

        assert_eq!(s.run().unwrap(), DrainReason::Completed);
        let record = s.process(pid(2)).unwrap();
        assert_eq!(record.completion_time(), Some(9));
        assert_eq!(record.total_cpu_used(), 5);
        assert_eq!(record.total_io_time(), 4);
        assert_eq!(s.dispatch_count(), 3);
        assert_eq!(s.steps(), 5);

        let kinds: Vec<EventKind> = s.events().iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![EventKind::IoWait, EventKind::IoWait, EventKind::Finished]);
    }

    #[test]
    fn test_stall_is_detected() {
        let log = SharedLogSink::new();
        let config = SimulationConfig::new(
            settings(4, 3, 5, 0),
            vec![ProcessDescriptor::new(1, 1, 5), ProcessDescriptor::new(2, 1, 5)],
        )
        .unwrap();
        let mut s = Scheduler::new(&config, Box::new(log.clone())).unwrap();
        s.clear_ready_queues();

        let mut reason = None;
        for _ in 0..10 {
            if let Some(r) = s.step().unwrap() {
                reason = Some(r);
                break;
            }
        }

        let Some(DrainReason::Stalled(diagnostic)) = reason.clone() else {
            panic!("expected a stall, got {:?}", reason);
        };
        assert_eq!(diagnostic.clock, 0);
        assert_eq!(diagnostic.unfinished, vec![pid(1), pid(2)]);
        assert!(diagnostic.io_waiting.is_empty());
        assert_eq!(s.phase(), SchedulerPhase::Drained);
        assert_eq!(log.entries_at(LogLevel::Error).len(), 1);

        // drained schedulers keep reporting the same outcome
        assert_eq!(s.run().unwrap(), DrainReason::Stalled(diagnostic));
    }

    #[test]
    fn test_strict_priority_and_round_robin() {
        let mut s = scheduler(
            settings(2, 3, 100, 0),
            vec![
                ProcessDescriptor::new(10, 2, 2),
                ProcessDescriptor::new(1, 1, 4),
                ProcessDescriptor::new(2, 1, 4),
            ],
        );

        assert_eq!(s.run().unwrap(), DrainReason::Completed);
        let order: Vec<u32> = s.events().iter().map(|e| e.pid.get()).collect();
        assert_eq!(order, vec![1, 2, 1, 2, 10]);
        assert_eq!(s.process(pid(10)).unwrap().first_response_time(), Some(8));
    }

    #[test]
    fn test_context_switch_cost() {
        let mut s = scheduler(
            settings(4, 3, 5, 1),
            vec![ProcessDescriptor::new(1, 1, 6), ProcessDescriptor::new(2, 1, 6)],
        );

        assert_eq!(s.run().unwrap(), DrainReason::Completed);
        assert_eq!(s.context_switches(), 3);
        assert_eq!(s.clock(), 15);
        assert_eq!(s.process(pid(1)).unwrap().first_response_time(), Some(0));
        assert_eq!(s.process(pid(2)).unwrap().first_response_time(), Some(5));
        assert_eq!(s.process(pid(1)).unwrap().completion_time(), Some(12));
        assert_eq!(s.process(pid(2)).unwrap().completion_time(), Some(15));
    }

    #[test]
    fn test_no_context_switch_when_same_process_continues() {
        let mut s = scheduler(settings(4, 3, 5, 3), vec![ProcessDescriptor::new(1, 1, 12)]);
        s.run().unwrap();
        assert_eq!(s.context_switches(), 0);
        assert_eq!(s.clock(), 12);
    }

    #[test]
    fn test_aging_promotes_starved_process() {
        let mut s = scheduler(
            settings(4, 3, 5, 0),
            vec![ProcessDescriptor::new(1, 1, 100), ProcessDescriptor::new(2, 2, 4)],
        );

        for _ in 0..4 {
            s.step().unwrap();
            assert_eq!(s.process(pid(2)).unwrap().priority(), 2);
        }
        assert_eq!(s.process(pid(2)).unwrap().waiting_time(), 16);

        s.step().unwrap();
        let starved = s.process(pid(2)).unwrap();
        assert_eq!(starved.priority(), 1);
        assert_eq!(starved.priority_at_last_run(), 2);
        assert_eq!(starved.waiting_time(), 0);
        assert_eq!(s.ready_sequence(1), vec![pid(1), pid(2)]);
        assert!(s.ready_sequence(2).is_empty());
        assert_single_ownership(&s);

        s.step().unwrap();
        s.step().unwrap();
        let starved = s.process(pid(2)).unwrap();
        assert_eq!(starved.first_response_time(), Some(24));
        assert_eq!(starved.completion_time(), Some(28));
        assert_eq!(s.events()[6].waiting_time, 4);
    }

    #[test]
    fn test_io_completion_waits_for_next_iteration() {
        let mut s = scheduler(
            settings(4, 3, 100, 0),
            vec![
                ProcessDescriptor::new(1, 1, 3).with_io(1),
                ProcessDescriptor::new(2, 2, 20),
            ],
        );

        // pid 1 blocks after one unit
        s.step().unwrap();
        assert_eq!(s.io_waiting(), vec![pid(1)]);

        // pid 2 runs a full slice; pid 1's I/O completes during it
        s.step().unwrap();
        assert_eq!(s.events()[1].pid, pid(2));
        assert!(s.io_waiting().is_empty());
        assert_eq!(s.ready_sequence(1), vec![pid(1)]);

        // now pid 1 outranks pid 2 again
        s.step().unwrap();
        assert_eq!(s.events()[2].pid, pid(1));
        assert_eq!(s.process(pid(1)).unwrap().total_io_time(), 1);
    }

    #[test]
    fn test_invariants_hold_every_step() {
        let mut s = scheduler(
            settings(3, 4, 2, 1),
            vec![
                ProcessDescriptor::new(1, 4, 17),
                ProcessDescriptor::new(2, 1, 9).with_io(4),
                ProcessDescriptor::new(3, 2, 11).with_io(2),
                ProcessDescriptor::new(4, 3, 5),
                ProcessDescriptor::new(5, 1, 7).with_io(7),
            ],
        );

        let mut last_clock = 0;
        let mut reason = None;
        for _ in 0..500 {
            assert_single_ownership(&s);
            assert_conserved(&s);
            if let Some(r) = s.step().unwrap() {
                reason = Some(r);
                break;
            }
            assert!(s.clock() >= last_clock);
            last_clock = s.clock();
        }

        assert_eq!(reason, Some(DrainReason::Completed));
        for record in s.processes() {
            assert!(record.is_finished());
            assert_eq!(record.remaining_time(), 0);
            assert!(record.completion_time().is_some());
            assert!(record.first_response_time().is_some());
            assert!(record.completion_time() <= Some(s.clock()));
        }
        assert_single_ownership(&s);
        assert_conserved(&s);
    }

    #[test]
    fn test_step_limit() {
        let mut limited = settings(4, 3, 5, 0);
        limited.max_dispatch_steps = Some(2);
        let mut s = scheduler(limited, vec![ProcessDescriptor::new(1, 1, 100)]);

        assert_eq!(s.run().unwrap(), DrainReason::StepLimitReached { limit: 2 });
        assert_eq!(s.dispatch_count(), 2);
        assert_eq!(s.clock(), 8);
        assert_eq!(s.process(pid(1)).unwrap().completion_time(), None);
    }

    #[test]
    fn test_deterministic_runs() {
        let processes = vec![
            ProcessDescriptor::new(1, 2, 13).with_io(3),
            ProcessDescriptor::new(2, 3, 8),
            ProcessDescriptor::new(3, 1, 6).with_io(5),
        ];
        let mut first = scheduler(settings(4, 3, 2, 1), processes.clone());
        let mut second = scheduler(settings(4, 3, 2, 1), processes);

        first.run().unwrap();
        second.run().unwrap();
        assert_eq!(first.events(), second.events());
        assert_eq!(first.processes(), second.processes());
        assert_eq!(first.clock(), second.clock());
    }

    struct RecordingCollector {
        seen: Option<(usize, u64)>,
    }

    impl MetricsCollector for RecordingCollector {
        fn collect(&mut self, processes: &[ProcessRecord], final_clock: u64) -> Result<(), SinkError> {
            self.seen = Some((processes.len(), final_clock));
            Ok(())
        }
    }

    struct FailingLog;

    impl EventLogSink for FailingLog {
        fn flush(&mut self, _events: &[ScheduleEvent]) -> Result<(), SinkError> {
            Err(SinkError::EventLog("disk full".to_string()))
        }
    }

    #[test]
    fn test_run_to_completion_hands_off() {
        let mut s = scheduler(
            settings(4, 3, 5, 0),
            vec![ProcessDescriptor::new(1, 1, 6), ProcessDescriptor::new(2, 2, 3)],
        );
        let mut log = MemoryEventLog::new();
        let mut metrics = RecordingCollector { seen: None };

        let reason = s.run_to_completion(&mut log, &mut metrics).unwrap();
        assert_eq!(reason, DrainReason::Completed);
        assert_eq!(log.flushes(), 1);
        assert_eq!(log.events(), s.events());
        assert_eq!(metrics.seen, Some((2, 9)));
    }

    #[test]
    fn test_run_to_completion_propagates_sink_failure() {
        let mut s = scheduler(settings(4, 3, 5, 0), vec![ProcessDescriptor::new(1, 1, 2)]);
        let mut metrics = RecordingCollector { seen: None };

        let result = s.run_to_completion(&mut FailingLog, &mut metrics);
        assert!(matches!(result, Err(SchedulerError::Sink(SinkError::EventLog(_)))));
        assert_eq!(metrics.seen, None);
    }

    #[test]
    fn test_debug_logging() {
        let log = SharedLogSink::new();
        let config = SimulationConfig::new(
            settings(4, 3, 5, 0),
            vec![ProcessDescriptor::new(1, 1, 5).with_io(3)],
        )
        .unwrap();
        let mut s = Scheduler::new(&config, Box::new(log.clone())).unwrap();
        s.run().unwrap();

        let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
        assert!(messages.contains(&"Executed slice".to_string()));
        assert!(messages.contains(&"I/O complete".to_string()));
        assert!(messages.contains(&"Process finished".to_string()));
        assert_eq!(messages.last().map(String::as_str), Some("Scheduler drained"));
    }
}
