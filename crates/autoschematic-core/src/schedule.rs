//! Tick-scheduler abstraction.
//!
//! The core is written against [`TickScheduler`] rather than a concrete
//! tick loop. The host provides the real implementation; tests drive a
//! [`TickQueue`](crate::tick_queue::TickQueue) by hand.
//!
//! Threading contract:
//!
//! - [`run_async`](TickScheduler::run_async) tasks run off the owner
//!   thread and must not mutate the world.
//! - Every other task runs on the owner thread, one at a time, in tick
//!   order.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ticks per second of the host loop.
pub const DEFAULT_TICKS_PER_SECOND: u64 = 20;

/// A one-shot task.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A repeating task. Returning [`ControlFlow::Break`] unschedules it.
pub type RepeatingTask = Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>;

/// Cancellation handle for a scheduled task.
///
/// Cancelling is idempotent. A cancelled task never runs again; if it is
/// currently running, it finishes its current invocation.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Create a live handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the task from running again.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Cooperative tick-based task runner.
pub trait TickScheduler: Send + Sync {
    /// Ticks per second, used to convert timeouts to tick delays.
    fn ticks_per_second(&self) -> u64 {
        DEFAULT_TICKS_PER_SECOND
    }

    /// The tick currently executing (or last executed).
    fn current_tick(&self) -> u64;

    /// Run `task` on a background worker.
    fn run_async(&self, task: Task);

    /// Run `task` on the owner thread at the next tick.
    fn run_on_owner(&self, task: Task);

    /// Run `task` on the owner thread every `interval` ticks, first after
    /// `delay` ticks.
    fn run_repeating(&self, task: RepeatingTask, delay: u64, interval: u64) -> TaskHandle;

    /// Run `task` on the owner thread once, after `delay` ticks.
    fn run_after(&self, task: Task, delay: u64) -> TaskHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_across_clones() {
        let handle = TaskHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
        handle.cancel();
        assert!(clone.is_cancelled());
    }
}
