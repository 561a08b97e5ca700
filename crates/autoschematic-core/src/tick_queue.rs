//! Deterministic tick queue.
//!
//! [`TickQueue`] is a [`TickScheduler`] whose clock only moves when
//! [`tick`](TickQueue::tick) is called. The host calls it from its tick
//! loop at a fixed rate; tests call it directly to simulate time.
//!
//! Ordering within a tick:
//!
//! 1. Background tasks queued via `run_async` (simulated worker pool).
//! 2. Owner-thread entries that are due, ordered by due tick and then by
//!    registration order. Repeating tasks keep their registration order
//!    across reschedules.
//!
//! Tasks never run while the internal lock is held, so a task may freely
//! schedule or cancel other tasks.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::schedule::{DEFAULT_TICKS_PER_SECOND, RepeatingTask, Task, TaskHandle, TickScheduler};

/// Work attached to a queue entry.
enum Job {
    Once(Task),
    Repeating { task: RepeatingTask, interval: u64 },
}

/// A task waiting for its due tick.
struct Entry {
    due: u64,
    seq: u64,
    handle: TaskHandle,
    job: Job,
}

#[derive(Default)]
struct QueueState {
    tick: u64,
    next_seq: u64,
    background: VecDeque<Task>,
    entries: Vec<Entry>,
}

impl QueueState {
    fn push(&mut self, due: u64, handle: TaskHandle, job: Job) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.entries.push(Entry {
            due,
            seq,
            handle,
            job,
        });
    }
}

/// Manually clocked scheduler.
pub struct TickQueue {
    ticks_per_second: u64,
    state: Mutex<QueueState>,
}

impl TickQueue {
    /// A queue at tick 0 running at [`DEFAULT_TICKS_PER_SECOND`].
    pub fn new() -> Self {
        Self::with_ticks_per_second(DEFAULT_TICKS_PER_SECOND)
    }

    /// A queue at tick 0 reporting the given rate (minimum 1).
    pub fn with_ticks_per_second(ticks_per_second: u64) -> Self {
        Self {
            ticks_per_second: ticks_per_second.max(1),
            state: Mutex::new(QueueState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advance the clock by one tick and run everything that is due.
    ///
    /// Returns the tick that was executed.
    pub fn tick(&self) -> u64 {
        let (now, background, mut due) = {
            let mut state = self.lock();
            state.tick = state.tick.saturating_add(1);
            let now = state.tick;
            let background = std::mem::take(&mut state.background);
            let (due, later): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut state.entries)
                .into_iter()
                .filter(|entry| !entry.handle.is_cancelled())
                .partition(|entry| entry.due <= now);
            state.entries = later;
            (now, background, due)
        };
        due.sort_by_key(|entry| (entry.due, entry.seq));

        for task in background {
            task();
        }

        for entry in due {
            if entry.handle.is_cancelled() {
                continue;
            }
            match entry.job {
                Job::Once(task) => task(),
                Job::Repeating { mut task, interval } => {
                    let flow = task();
                    if flow.is_continue() && !entry.handle.is_cancelled() {
                        let mut state = self.lock();
                        state.entries.push(Entry {
                            due: now.saturating_add(interval),
                            seq: entry.seq,
                            handle: entry.handle,
                            job: Job::Repeating { task, interval },
                        });
                    }
                }
            }
        }

        now
    }

    /// Run `ticks` consecutive ticks.
    pub fn advance(&self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Number of queued tasks that have not been cancelled.
    pub fn pending(&self) -> usize {
        let state = self.lock();
        let live = state
            .entries
            .iter()
            .filter(|entry| !entry.handle.is_cancelled())
            .count();
        live.saturating_add(state.background.len())
    }
}

impl Default for TickQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TickQueue")
            .field("ticks_per_second", &self.ticks_per_second)
            .field("tick", &state.tick)
            .field("entries", &state.entries.len())
            .field("background", &state.background.len())
            .finish_non_exhaustive()
    }
}

impl TickScheduler for TickQueue {
    fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    fn current_tick(&self) -> u64 {
        self.lock().tick
    }

    fn run_async(&self, task: Task) {
        self.lock().background.push_back(task);
    }

    fn run_on_owner(&self, task: Task) {
        let mut state = self.lock();
        let due = state.tick.saturating_add(1);
        state.push(due, TaskHandle::new(), Job::Once(task));
    }

    fn run_repeating(&self, task: RepeatingTask, delay: u64, interval: u64) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut state = self.lock();
        let due = state.tick.saturating_add(delay.max(1));
        state.push(
            due,
            handle.clone(),
            Job::Repeating {
                task,
                interval: interval.max(1),
            },
        );
        handle
    }

    fn run_after(&self, task: Task, delay: u64) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut state = self.lock();
        let due = state.tick.saturating_add(delay.max(1));
        state.push(due, handle.clone(), Job::Once(task));
        handle
    }
}
