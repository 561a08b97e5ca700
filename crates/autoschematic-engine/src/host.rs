//! Host side of the tick scheduler.
//!
//! Owner-thread work runs on the tick loop, one [`TickQueue::tick`] per
//! tick interval. Background work goes to tokio's blocking pool.

use std::sync::Arc;
use std::time::Duration;

use autoschematic_core::schedule::{RepeatingTask, Task, TaskHandle, TickScheduler};
use autoschematic_core::tick_queue::TickQueue;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// [`TickScheduler`] backed by a [`TickQueue`] and the tokio blocking pool.
#[derive(Debug, Clone)]
pub struct HostScheduler {
    queue: Arc<TickQueue>,
    runtime: tokio::runtime::Handle,
}

impl HostScheduler {
    /// Wrap `queue`, sending background work to `runtime`.
    pub const fn new(queue: Arc<TickQueue>, runtime: tokio::runtime::Handle) -> Self {
        Self { queue, runtime }
    }

    /// The queue the tick loop drives.
    pub const fn queue(&self) -> &Arc<TickQueue> {
        &self.queue
    }
}

impl TickScheduler for HostScheduler {
    fn ticks_per_second(&self) -> u64 {
        self.queue.ticks_per_second()
    }

    fn current_tick(&self) -> u64 {
        self.queue.current_tick()
    }

    fn run_async(&self, task: Task) {
        drop(self.runtime.spawn_blocking(task));
    }

    fn run_on_owner(&self, task: Task) {
        self.queue.run_on_owner(task);
    }

    fn run_repeating(&self, task: RepeatingTask, delay: u64, interval: u64) -> TaskHandle {
        self.queue.run_repeating(task, delay, interval)
    }

    fn run_after(&self, task: Task, delay: u64) -> TaskHandle {
        self.queue.run_after(task, delay)
    }
}

/// Interval between ticks at `ticks_per_second`.
pub fn tick_interval(ticks_per_second: u64) -> Duration {
    let millis = 1000_u64.checked_div(ticks_per_second).unwrap_or(50).max(1);
    Duration::from_millis(millis)
}

/// Tick `queue` at its configured rate until `shutdown` flips to `true`.
///
/// Late ticks are skipped rather than bunched up.
pub async fn run_tick_loop(queue: Arc<TickQueue>, mut shutdown: watch::Receiver<bool>) -> u64 {
    let period = tick_interval(queue.ticks_per_second());
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(period_ms = period.as_millis(), "Tick loop started");

    let mut last = queue.current_tick();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                last = queue.tick();
                if last.checked_rem(queue.ticks_per_second().saturating_mul(60)) == Some(0) {
                    debug!(tick = last, pending = queue.pending(), "Tick loop alive");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!(tick = last, "Tick loop stopped");
    last
}
