//! # Ready Queue
//!
//! A fixed-capacity FIFO of pool indices, one instance per priority level.
//!
//! The queue is a circular buffer: push, pop and front are O(1). Removal
//! from the middle (needed when aging promotes a waiting process) closes
//! the gap by shifting the tail end forward, so the relative order of the
//! remaining entries is preserved.
//!
//! Capacity is fixed at construction. Pushing into a full queue or popping
//! an empty one is a protocol violation and is reported as a
//! [`QueueError`] rather than silently ignored.

use core_types::ProcessIndex;
use thiserror::Error;

/// Ready queue protocol violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Push attempted on a full queue
    #[error("Queue is full (capacity {capacity})")]
    Full { capacity: usize },

    /// Pop or front attempted on an empty queue
    #[error("Queue is empty")]
    Empty,
}

/// Bounded FIFO of process indices
#[derive(Debug, Clone)]
pub struct ReadyQueue {
    slots: Box<[ProcessIndex]>,
    head: usize,
    len: usize,
}

impl ReadyQueue {
    /// Creates an empty queue able to hold `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![ProcessIndex::default(); capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    fn slot(&self, offset: usize) -> usize {
        (self.head + offset) % self.capacity()
    }

    /// Appends `index` at the tail
    pub fn push(&mut self, index: ProcessIndex) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full {
                capacity: self.capacity(),
            });
        }
        let tail = self.slot(self.len);
        self.slots[tail] = index;
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the head entry
    pub fn pop(&mut self) -> Result<ProcessIndex, QueueError> {
        if self.is_empty() {
            return Err(QueueError::Empty);
        }
        let index = self.slots[self.head];
        self.head = self.slot(1);
        self.len -= 1;
        if self.len == 0 {
            self.head = 0;
        }
        Ok(index)
    }

    /// Returns the head entry without removing it
    pub fn front(&self) -> Result<ProcessIndex, QueueError> {
        if self.is_empty() {
            return Err(QueueError::Empty);
        }
        Ok(self.slots[self.head])
    }

    /// Returns true if `index` is queued
    pub fn contains(&self, index: ProcessIndex) -> bool {
        self.iter().any(|queued| queued == index)
    }

    /// Removes the first occurrence of `index`
    ///
    /// Entries behind it move forward one slot; returns false if `index`
    /// is not queued.
    pub fn remove(&mut self, index: ProcessIndex) -> bool {
        let Some(found) = self.iter().position(|queued| queued == index) else {
            return false;
        };

        for offset in found..self.len - 1 {
            let to = self.slot(offset);
            let from = self.slot(offset + 1);
            self.slots[to] = self.slots[from];
        }
        self.len -= 1;
        if self.len == 0 {
            self.head = 0;
        }
        true
    }

    /// Drops every entry
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Iterates from head to tail
    pub fn iter(&self) -> impl Iterator<Item = ProcessIndex> + '_ {
        (0..self.len).map(move |offset| self.slots[self.slot(offset)])
    }

    /// Snapshot of the queue, head to tail
    pub fn to_ordered_sequence(&self) -> Vec<ProcessIndex> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(raw: usize) -> ProcessIndex {
        ProcessIndex::new(raw)
    }

    fn raw(queue: &ReadyQueue) -> Vec<usize> {
        queue.to_ordered_sequence().iter().map(|i| i.get()).collect()
    }

    fn filled(capacity: usize, entries: &[usize]) -> ReadyQueue {
        let mut queue = ReadyQueue::with_capacity(capacity);
        for &e in entries {
            queue.push(idx(e)).unwrap();
        }
        queue
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = filled(6, &[3, 1, 4]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Ok(idx(3)));
        assert_eq!(queue.pop(), Ok(idx(1)));
        assert_eq!(queue.pop(), Ok(idx(4)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_first_occurrence_only() {
        let mut queue = filled(6, &[3, 1, 4, 1, 5]);
        assert!(queue.remove(idx(1)));
        assert_eq!(raw(&queue), vec![3, 4, 1, 5]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_remove_missing_returns_false() {
        let mut queue = filled(4, &[2, 7]);
        assert!(!queue.remove(idx(9)));
        assert_eq!(raw(&queue), vec![2, 7]);

        let mut empty = ReadyQueue::with_capacity(4);
        assert!(!empty.remove(idx(0)));
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut queue = filled(5, &[1, 2, 3]);
        assert!(queue.remove(idx(1)));
        assert_eq!(raw(&queue), vec![2, 3]);
        assert!(queue.remove(idx(3)));
        assert_eq!(raw(&queue), vec![2]);
        assert!(queue.remove(idx(2)));
        assert!(queue.is_empty());
        queue.push(idx(8)).unwrap();
        assert_eq!(raw(&queue), vec![8]);
    }

    #[test]
    fn test_remove_across_wraparound() {
        let mut queue = filled(4, &[0, 1, 2, 3]);
        queue.pop().unwrap();
        queue.pop().unwrap();
        queue.push(idx(4)).unwrap();
        queue.push(idx(5)).unwrap();
        // physical layout now wraps: [4, 5, 2, 3] with head at 2
        assert_eq!(raw(&queue), vec![2, 3, 4, 5]);

        assert!(queue.remove(idx(3)));
        assert_eq!(raw(&queue), vec![2, 4, 5]);
        queue.push(idx(6)).unwrap();
        assert_eq!(raw(&queue), vec![2, 4, 5, 6]);
        assert!(queue.is_full());
    }

    #[test]
    fn test_push_when_full_is_error() {
        let mut queue = filled(2, &[1, 2]);
        assert_eq!(queue.push(idx(3)), Err(QueueError::Full { capacity: 2 }));
        assert_eq!(raw(&queue), vec![1, 2]);
    }

    #[test]
    fn test_pop_and_front_when_empty_are_errors() {
        let mut queue = ReadyQueue::with_capacity(3);
        assert_eq!(queue.pop(), Err(QueueError::Empty));
        assert_eq!(queue.front(), Err(QueueError::Empty));
    }

    #[test]
    fn test_front_does_not_remove() {
        let queue = filled(3, &[9, 8]);
        assert_eq!(queue.front(), Ok(idx(9)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_contains() {
        let mut queue = filled(3, &[5, 6]);
        assert!(queue.contains(idx(5)));
        assert!(!queue.contains(idx(7)));
        queue.pop().unwrap();
        assert!(!queue.contains(idx(5)));
    }

    #[test]
    fn test_clear() {
        let mut queue = filled(3, &[1, 2, 3]);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 3);
        queue.push(idx(4)).unwrap();
        assert_eq!(raw(&queue), vec![4]);
    }

    #[test]
    fn test_zero_capacity_queue() {
        let mut queue = ReadyQueue::with_capacity(0);
        assert!(queue.is_full());
        assert_eq!(queue.push(idx(1)), Err(QueueError::Full { capacity: 0 }));
        assert!(!queue.contains(idx(1)));
    }
}
