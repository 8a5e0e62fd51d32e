//! Deferred work for a director tick loop.
//!
//! A time-ordered heap of `(deadline, task)` on the OS monotonic clock.
//! There is no cancel: tasks must be idempotent and re-check their
//! preconditions when they run. Missed deadlines fire on the next tick.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

struct Entry<T> {
    due: Instant,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // The sequence number keeps same-deadline tasks in queue order.
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

pub struct Scheduler<T> {
    queue: BinaryHeap<Reverse<Entry<T>>>,
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
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueue a task to run once `due` has passed.
    pub fn queue(&mut self, task: T, due: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry { due, seq, task }));
    }

    /// Pop every task whose deadline has passed, in deadline order.
    ///
    /// Tasks are returned rather than run in place so the caller can hand
    /// each one exclusive access to the director state.
    pub fn drain_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(Reverse(head)) = self.queue.peek() {
            if head.due > now {
                break;
            }
            let Some(Reverse(entry)) = self.queue.pop() else {
                break;
            };
            due.push(entry.task);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fires_in_deadline_order() {
        let mut s = Scheduler::new();
        let now = Instant::now();
        s.queue("late", now + Duration::from_secs(2));
        s.queue("early", now + Duration::from_secs(1));

        assert!(s.drain_due(now).is_empty());
        assert_eq!(s.drain_due(now + Duration::from_secs(3)), vec!["early", "late"]);
        assert!(s.is_empty());
    }

    #[test]
    fn same_deadline_keeps_queue_order() {
        let mut s = Scheduler::new();
        let now = Instant::now();
        let due = now + Duration::from_millis(10);
        s.queue(1, due);
        s.queue(2, due);
        s.queue(3, due);
        assert_eq!(s.drain_due(due), vec![1, 2, 3]);
    }

    #[test]
    fn missed_deadlines_fire_on_next_drain() {
        let mut s = Scheduler::new();
        let now = Instant::now();
        s.queue("overdue", now - Duration::from_secs(5));
        assert_eq!(s.drain_due(now), vec!["overdue"]);
    }
}
