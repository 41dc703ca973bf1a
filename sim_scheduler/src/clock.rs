//! # Simulated Clock
//!
//! Deterministic, monotonic simulated time. The clock only advances when
//! the dispatch loop tells it to: by a context switch, by an executed
//! slice, or by fast-forwarding through an I/O stall.

/// Monotonic simulated clock
///
/// # Examples
///
/// ```
/// use sim_scheduler::clock::SimClock;
///
/// let mut clock = SimClock::new();
/// clock.advance(4);
/// clock.advance(2);
/// assert_eq!(clock.now(), 6);
/// assert_eq!(clock.since(4), 2);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimClock {
    ticks: u64,
}

impl SimClock {
    /// Creates a clock at time 0
    pub fn new() -> Self {
        Self { ticks: 0 }
    }

    /// Creates a clock starting at `ticks`
    pub fn with_initial_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Advances the clock by `delta`, saturating at `u64::MAX`
    pub fn advance(&mut self, delta: u64) {
        self.ticks = self.ticks.saturating_add(delta);
    }

    /// Returns the current simulated time
    pub fn now(&self) -> u64 {
        self.ticks
    }

    /// Time elapsed since `mark`; 0 if `mark` lies in the future
    pub fn since(&self, mark: u64) -> u64 {
        self.ticks.saturating_sub(mark)
    }
}
