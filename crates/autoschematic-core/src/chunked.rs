//! Chunked apply: a bounded number of units per tick, racing a timeout.
//!
//! ```text
//!            per-tick step
//!   Running ────────────────► Completed
//!      │  └─ step error ─────► Errored
//!      └──── one-shot timer ─► TimedOut
//! ```
//!
//! All three terminal transitions go through [`ChunkedPaste::terminate`],
//! which claims the outcome first. The loser of a race finds the outcome
//! claimed and does nothing. The winner takes the [`OperationState`] out of
//! its slot, so the edit session is closed exactly once.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::capability::{
    Clipboard, EditSession, OperationError, PasteOperation, SessionError, WorldHandle,
};
use crate::completion::{Completion, settle};
use crate::error::PasteError;
use crate::options::PasteOptions;
use crate::outcome::PasteReport;
use crate::region::RegionGuard;
use crate::schedule::{TaskHandle, TickScheduler};
use crate::strategy::PasteStrategy;

/// Result of one per-tick step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickProgress {
    /// More units remain.
    Running {
        /// Units processed during this tick.
        advanced: u64,
    },
    /// Every unit has been processed.
    Completed,
}

/// Resumable state of one in-flight chunked paste.
///
/// Owned by exactly one [`ChunkedPaste`]; destroyed on its terminal
/// transition.
pub struct OperationState {
    total_units: u64,
    processed_units: u64,
    deadline_tick: u64,
    operation: Box<dyn PasteOperation>,
    session: Box<dyn EditSession>,
    region: Option<RegionGuard>,
}

impl OperationState {
    /// Wrap an operation and the session it writes through.
    pub fn new(
        operation: Box<dyn PasteOperation>,
        session: Box<dyn EditSession>,
        deadline_tick: u64,
        region: Option<RegionGuard>,
    ) -> Self {
        Self {
            total_units: operation.total_units(),
            processed_units: 0,
            deadline_tick,
            operation,
            session,
            region,
        }
    }

    /// Units the operation will process in total.
    pub const fn total_units(&self) -> u64 {
        self.total_units
    }

    /// Units processed so far. Never decreases, never exceeds the total.
    pub const fn processed_units(&self) -> u64 {
        self.processed_units
    }

    /// Tick at which the timeout fires.
    pub const fn deadline_tick(&self) -> u64 {
        self.deadline_tick
    }

    /// Advance the operation by at most `max_units_per_tick` units.
    ///
    /// Stops early when the operation reports no progress, leaving the
    /// rest for the next tick.
    ///
    /// # Errors
    ///
    /// Returns the operation's error; progress made before it is kept.
    pub fn step(&mut self, max_units_per_tick: u64) -> Result<TickProgress, OperationError> {
        let mut done: u64 = 0;
        while done < max_units_per_tick && self.processed_units < self.total_units {
            let budget = max_units_per_tick.saturating_sub(done);
            let advanced = self.operation.advance_by(self.session.as_mut(), budget)?;
            done = done.saturating_add(advanced);
            self.processed_units = self
                .processed_units
                .saturating_add(advanced)
                .min(self.total_units);
            if self.operation.is_complete() {
                self.processed_units = self.total_units;
                break;
            }
            if advanced == 0 {
                break;
            }
        }

        if self.processed_units >= self.total_units {
            Ok(TickProgress::Completed)
        } else {
            Ok(TickProgress::Running { advanced: done })
        }
    }

    /// Close the session, then release the operation and the region.
    fn close(mut self) -> Result<(), SessionError> {
        let result = self.session.close();
        drop(self.region.take());
        result
    }
}

impl std::fmt::Debug for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationState")
            .field("total_units", &self.total_units)
            .field("processed_units", &self.processed_units)
            .field("deadline_tick", &self.deadline_tick)
            .finish_non_exhaustive()
    }
}

/// The state machine shared by the per-tick task and the timeout task.
pub(crate) struct ChunkedPaste {
    state: Option<OperationState>,
    completion: Completion,
    max_units_per_tick: u64,
    timeout_seconds: u32,
    ticks_run: u64,
    task: Option<TaskHandle>,
    timer: Option<TaskHandle>,
}

impl ChunkedPaste {
    pub(crate) const fn new(
        state: OperationState,
        completion: Completion,
        max_units_per_tick: u64,
        timeout_seconds: u32,
    ) -> Self {
        Self {
            state: Some(state),
            completion,
            max_units_per_tick,
            timeout_seconds,
            ticks_run: 0,
            task: None,
            timer: None,
        }
    }

    /// Record the scheduled tasks so a terminal transition can cancel them.
    fn attach(&mut self, task: TaskHandle, timer: TaskHandle) {
        if self.state.is_none() {
            task.cancel();
            timer.cancel();
        }
        self.task = Some(task);
        self.timer = Some(timer);
    }

    #[cfg(test)]
    pub(crate) const fn is_running(&self) -> bool {
        self.state.is_some()
    }

    pub(crate) fn processed_units(&self) -> Option<u64> {
        self.state.as_ref().map(OperationState::processed_units)
    }

    /// Per-tick callback.
    pub(crate) fn on_tick(&mut self) -> ControlFlow<()> {
        let Some(state) = self.state.as_mut() else {
            return ControlFlow::Break(());
        };
        self.ticks_run = self.ticks_run.saturating_add(1);
        match state.step(self.max_units_per_tick) {
            Ok(TickProgress::Running { advanced }) => {
                debug!(
                    request = %self.completion.id(),
                    advanced,
                    processed = state.processed_units(),
                    total = state.total_units(),
                    "Chunked paste progress"
                );
                ControlFlow::Continue(())
            }
            Ok(TickProgress::Completed) => {
                self.terminate(Ok(()));
                ControlFlow::Break(())
            }
            Err(err) => {
                self.terminate(Err(PasteError::Apply {
                    message: err.message,
                }));
                ControlFlow::Break(())
            }
        }
    }

    /// One-shot timeout callback. A no-op once the outcome is resolved.
    pub(crate) fn on_timeout(&mut self) {
        if self.completion.is_resolved() {
            debug!(request = %self.completion.id(), "Timeout check after completion");
            return;
        }
        warn!(
            request = %self.completion.id(),
            processed = self.processed_units(),
            seconds = self.timeout_seconds,
            "Chunked paste deadline reached"
        );
        self.terminate(Err(PasteError::Timeout {
            seconds: self.timeout_seconds,
        }));
    }

    /// Claim, cancel, clean up, resolve. Returns `false` if another path
    /// already resolved the outcome.
    fn terminate(&mut self, result: Result<(), PasteError>) -> bool {
        let Some(claim) = self.completion.try_claim() else {
            return false;
        };
        if let Some(task) = &self.task {
            task.cancel();
        }
        if let Some(timer) = &self.timer {
            timer.cancel();
        }

        let (units, close) = self
            .state
            .take()
            .map_or((0, Ok(())), |state| (state.processed_units(), state.close()));
        let result = result.map(|()| PasteReport {
            origin: self.completion.origin(),
            strategy: PasteStrategy::Chunked,
            units,
            ticks: self.ticks_run,
        });
        let outcome = settle(self.completion.id(), result, close);
        self.completion.finish(claim, outcome);
        true
    }
}

fn lock(run: &Mutex<ChunkedPaste>) -> MutexGuard<'_, ChunkedPaste> {
    run.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Enter the chunked state machine. Runs on the owner thread.
///
/// Opens the session and builds the operation once, then schedules the
/// per-tick step (every tick, starting next tick) and the one-shot
/// timeout.
pub(crate) fn start(
    scheduler: &Arc<dyn TickScheduler>,
    world: &dyn WorldHandle,
    clipboard: Box<dyn Clipboard>,
    options: &PasteOptions,
    completion: Completion,
    region: RegionGuard,
) {
    let mut session = match world.open_session(options.session_flags) {
        Ok(session) => session,
        Err(err) => {
            drop(region);
            completion.fail(PasteError::Apply {
                message: err.message,
            });
            return;
        }
    };

    let operation = match clipboard.into_paste(completion.origin(), options.ignore_air_blocks) {
        Ok(operation) => operation,
        Err(err) => {
            let close = session.close();
            drop(region);
            if let Some(claim) = completion.try_claim() {
                let outcome = settle(
                    completion.id(),
                    Err(PasteError::Apply {
                        message: err.message,
                    }),
                    close,
                );
                completion.finish(claim, outcome);
            }
            return;
        }
    };

    let timeout_ticks = u64::from(options.timeout_seconds).saturating_mul(scheduler.ticks_per_second());
    let deadline_tick = scheduler.current_tick().saturating_add(timeout_ticks);
    let max_units_per_tick = options.effective_units_per_tick();
    let state = OperationState::new(operation, session, deadline_tick, Some(region));

    info!(
        request = %completion.id(),
        world = world.name(),
        total_units = state.total_units(),
        max_units_per_tick,
        deadline_tick,
        "Chunked paste started"
    );

    let run = Arc::new(Mutex::new(ChunkedPaste::new(
        state,
        completion,
        max_units_per_tick,
        options.timeout_seconds,
    )));

    let tick_run = Arc::clone(&run);
    let task = scheduler.run_repeating(Box::new(move || lock(&tick_run).on_tick()), 1, 1);

    let timeout_run = Arc::clone(&run);
    let timer = scheduler.run_after(Box::new(move || lock(&timeout_run).on_timeout()), timeout_ticks);

    lock(&run).attach(task, timer);
}
