//! Control-rate clock for the engine's repeating tasks.
//!
//! The clock only moves when the host calls `advance`; nothing here
//! touches audio. Tasks are one-shot entries. A repeating generator
//! reschedules itself after each firing with a delay computed from live
//! state at that moment.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// What a scheduled entry does when it comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    SequencerTick,
    ClackFire,
}

/// Handle to a pending task, usable to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// A task that came due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueTask {
    pub handle: TaskHandle,
    pub task: Task,
    /// Clock time the task was scheduled for (not when it was popped).
    pub at: f64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    at: f64,
    id: u64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed: BinaryHeap is a max-heap and we want the earliest first,
    // ties broken in scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        other.at.total_cmp(&self.at).then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: f64,
    next_id: u64,
    queue: BinaryHeap<Entry>,
    live: HashSet<u64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Move the clock forward. Negative or non-finite steps are ignored.
    pub fn advance(&mut self, dt: f64) {
        if dt.is_finite() && dt > 0.0 {
            self.now += dt;
        }
    }

    /// Schedule `task` to run `delay` seconds from now.
    pub fn schedule(&mut self, delay: f64, task: Task) -> TaskHandle {
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        self.schedule_at(self.now + delay, task)
    }

    /// Schedule `task` at absolute clock time `at`.
    pub fn schedule_at(&mut self, at: f64, task: Task) -> TaskHandle {
        let at = if at.is_finite() { at } else { self.now };
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Entry { at, id, task });
        self.live.insert(id);
        TaskHandle(id)
    }

    /// Cancel a pending task. False if it already ran or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.live.remove(&handle.0)
    }

    /// Cancel everything. Returns how many tasks were pending.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.live.len();
        self.live.clear();
        self.queue.clear();
        n
    }

    /// Number of tasks still waiting to run.
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.live.contains(&handle.0)
    }

    /// Pop the earliest task due at or before the current time.
    pub fn pop_due(&mut self) -> Option<DueTask> {
        while let Some(entry) = self.queue.peek().copied() {
            if entry.at > self.now {
                return None;
            }
            self.queue.pop();
            if self.live.remove(&entry.id) {
                return Some(DueTask {
                    handle: TaskHandle(entry.id),
                    task: entry.task,
                    at: entry.at,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_time_order() {
        let mut s = Scheduler::new();
        s.schedule(0.5, Task::ClackFire);
        s.schedule(0.2, Task::SequencerTick);
        s.advance(1.0);
        assert_eq!(s.pop_due().map(|d| d.task), Some(Task::SequencerTick));
        assert_eq!(s.pop_due().map(|d| d.task), Some(Task::ClackFire));
        assert_eq!(s.pop_due(), None);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn nothing_runs_early() {
        let mut s = Scheduler::new();
        s.schedule(0.6, Task::SequencerTick);
        s.advance(0.59);
        assert_eq!(s.pop_due(), None);
        s.advance(0.02);
        let due = s.pop_due().unwrap();
        assert_eq!(due.at, 0.6);
    }

    #[test]
    fn ties_run_in_scheduling_order() {
        let mut s = Scheduler::new();
        let a = s.schedule(0.1, Task::ClackFire);
        let b = s.schedule(0.1, Task::SequencerTick);
        s.advance(0.1);
        assert_eq!(s.pop_due().unwrap().handle, a);
        assert_eq!(s.pop_due().unwrap().handle, b);
    }

    #[test]
    fn cancelled_tasks_never_run() {
        let mut s = Scheduler::new();
        let a = s.schedule(0.1, Task::ClackFire);
        s.schedule(0.2, Task::SequencerTick);
        assert!(s.cancel(a));
        assert!(!s.cancel(a));
        assert!(!s.is_pending(a));
        s.advance(1.0);
        assert_eq!(s.pop_due().map(|d| d.task), Some(Task::SequencerTick));
        assert_eq!(s.pop_due(), None);
    }

    #[test]
    fn cancel_all_leaves_nothing_pending() {
        let mut s = Scheduler::new();
        s.schedule(0.1, Task::ClackFire);
        s.schedule(0.6, Task::SequencerTick);
        assert_eq!(s.cancel_all(), 2);
        assert_eq!(s.pending(), 0);
        s.advance(10.0);
        assert_eq!(s.pop_due(), None);
    }

    #[test]
    fn bad_steps_are_ignored() {
        let mut s = Scheduler::new();
        s.advance(-1.0);
        s.advance(f64::NAN);
        assert_eq!(s.now(), 0.0);
        s.schedule(f64::INFINITY, Task::ClackFire);
        assert!(s.pop_due().is_some());
    }
}
