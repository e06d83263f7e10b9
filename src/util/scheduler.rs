//! Tick-based one-shot task scheduling
//!
//! The simulation runs on a single authoritative tick loop, so timers are
//! modeled as tasks due at a future tick rather than wall-clock callbacks.
//! Every scheduled task returns a handle that can be cancelled, which lets
//! an entity being torn down drop its pending callbacks instead of having
//! them fire against stale state.

use crate::util::time::secs_to_ticks;

/// Handle to a scheduled task, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

#[derive(Debug)]
struct Entry<T> {
    id: u64,
    due_tick: u64,
    task: T,
}

/// One-shot task scheduler driven by the simulation tick counter
#[derive(Debug)]
pub struct TaskScheduler<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> TaskScheduler<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Schedule a task to fire once, `delay_secs` after the given tick
    pub fn schedule_once(&mut self, now_tick: u64, delay_secs: f32, task: T) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            due_tick: now_tick + secs_to_ticks(delay_secs),
            task,
        });
        TaskHandle(id)
    }

    /// Cancel a pending task. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != handle.0);
        self.entries.len() != before
    }

    /// Remove and return every task due at or before the given tick,
    /// in the order they were scheduled.
    pub fn drain_due(&mut self, now_tick: u64) -> Vec<T> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].due_tick <= now_tick {
                due.push(self.entries.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|e| e.id);
        due.into_iter().map(|e| e.task).collect()
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }
}

impl<T> Default for TaskScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
