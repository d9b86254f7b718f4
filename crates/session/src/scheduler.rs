use std::cmp::Ordering;
use std::collections::BinaryHeap;

use kitting_core::SimTick;

struct Scheduled<T> {
    due: SimTick,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest (due, seq) pops first.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Delayed work queue drained once per tick.
///
/// Tasks due on the same tick come out in the order they were scheduled.
pub struct Scheduler<T> {
    queue: BinaryHeap<Scheduled<T>>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> Scheduler<T> {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once `delay_ticks` have passed after `now`.
    pub fn schedule_after(&mut self, now: SimTick, delay_ticks: u64, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled {
            due: now.advance(delay_ticks),
            seq,
            task,
        });
    }

    /// Remove and return every task due at or before `now`.
    pub fn drain_due(&mut self, now: SimTick) -> Vec<T> {
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|next| next.due <= now) {
            if let Some(next) = self.queue.pop() {
                due.push(next.task);
            }
        }
        due
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether a queued task matches `pred`.
    pub fn contains(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.queue.iter().any(|s| pred(&s.task))
    }

    /// Drop every queued task.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
