//! # I/O Wait Set
//!
//! Tracks the processes currently counting down a simulated I/O burst.
//!
//! "Blocking" here is a pure counter: [`IoWaitSet::tick`] decrements each
//! active record's `io_remaining`, collecting the ones that reach zero into
//! a transient finished list. [`IoWaitSet::drain_finished`] then returns
//! those records to READY and removes them from the active set. The two
//! steps are always used back to back by the dispatch loop.
//!
//! The set stores pool indices and operates on the pool passed in by its
//! owner; it never holds references into the pool.

use crate::process::ProcessRecord;
use core_types::{Pid, ProcessIndex};

/// Processes blocked on simulated I/O
#[derive(Debug, Clone, Default)]
pub struct IoWaitSet {
    active: Vec<ProcessIndex>,
    finished: Vec<ProcessIndex>,
}

impl IoWaitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `index`; already tracked indices are ignored
    pub fn enqueue(&mut self, index: ProcessIndex) {
        if !self.active.contains(&index) {
            self.active.push(index);
        }
    }

    /// Counts every active record down by `delta`
    ///
    /// Records whose countdown reaches zero move to the finished list.
    pub fn tick(&mut self, pool: &mut [ProcessRecord], delta: u64) {
        for &index in &self.active {
            if self.finished.contains(&index) {
                continue;
            }
            if pool[index.get()].advance_io(delta) {
                self.finished.push(index);
            }
        }
    }

    /// Completes I/O for every finished record and returns their indices
    ///
    /// Returned indices are in the order they were enqueued; the finished
    /// list is empty afterwards.
    pub fn drain_finished(&mut self, pool: &mut [ProcessRecord]) -> Vec<ProcessIndex> {
        let finished = std::mem::take(&mut self.finished);
        for &index in &finished {
            pool[index.get()].finish_io();
        }
        self.active.retain(|index| !finished.contains(index));
        finished
    }

    /// Smallest outstanding countdown, or `None` when nothing is blocked
    pub fn min_remaining(&self, pool: &[ProcessRecord]) -> Option<u64> {
        self.active
            .iter()
            .map(|index| pool[index.get()].io_remaining())
            .min()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn size(&self) -> usize {
        self.active.len()
    }

    pub fn contains(&self, index: ProcessIndex) -> bool {
        self.active.contains(&index)
    }

    /// Returns true if a record with `pid` is blocked
    pub fn contains_pid(&self, pool: &[ProcessRecord], pid: Pid) -> bool {
        self.active.iter().any(|index| pool[index.get()].pid() == pid)
    }

    /// Blocked indices in the order they were enqueued
    pub fn active(&self) -> &[ProcessIndex] {
        &self.active
    }
}
