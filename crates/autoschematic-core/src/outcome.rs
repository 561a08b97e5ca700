//! Single-assignment outcome delivery.
//!
//! Several paths race to finish a request (per-tick completion, per-tick
//! error, timeout). Each calls [`OutcomeCell::try_claim`]; exactly one gets
//! an [`OutcomeClaim`] and performs cleanup and resolution, the rest are
//! no-ops. The caller observes the result through a [`PasteHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use autoschematic_types::{BlockPos, RequestId};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::{PasteError, PasteFailure};
use crate::strategy::PasteStrategy;

/// Details of a successful paste.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasteReport {
    /// Where the structure was placed.
    pub origin: BlockPos,
    /// Strategy that applied it.
    pub strategy: PasteStrategy,
    /// Units processed.
    pub units: u64,
    /// Ticks spent applying (0 for an immediate paste).
    pub ticks: u64,
}

/// Terminal result of a paste request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteOutcome {
    /// The structure landed.
    Success(PasteReport),
    /// The request failed.
    Failure(PasteFailure),
}

impl PasteOutcome {
    /// Shorthand for a failure without cleanup problems.
    pub const fn failed(cause: PasteError) -> Self {
        Self::Failure(PasteFailure::new(cause))
    }

    /// Whether this is a [`PasteOutcome::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The success report, if any.
    pub const fn report(&self) -> Option<&PasteReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Failure(_) => None,
        }
    }

    /// The failure, if any.
    pub const fn failure(&self) -> Option<&PasteFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// Create a linked cell and handle for one request.
pub fn outcome_channel(id: RequestId) -> (OutcomeCell, PasteHandle) {
    let (sender, receiver) = oneshot::channel();
    let cell = OutcomeCell {
        inner: Arc::new(CellInner {
            claimed: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        }),
    };
    let handle = PasteHandle {
        id,
        receiver: Some(receiver),
        resolved: None,
    };
    (cell, handle)
}

struct CellInner {
    claimed: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<PasteOutcome>>>,
}

/// Resolving side of a request's outcome. Cheap to clone.
#[derive(Clone)]
pub struct OutcomeCell {
    inner: Arc<CellInner>,
}

impl OutcomeCell {
    /// Attempt to become the one path allowed to resolve this outcome.
    ///
    /// Returns `None` if another path already claimed it.
    pub fn try_claim(&self) -> Option<OutcomeClaim> {
        self.inner
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| OutcomeClaim {
                inner: Arc::clone(&self.inner),
            })
    }

    /// Whether some path has claimed the outcome.
    pub fn is_claimed(&self) -> bool {
        self.inner.claimed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for OutcomeCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeCell")
            .field("claimed", &self.is_claimed())
            .finish()
    }
}

/// Exclusive right to resolve an outcome.
///
/// Dropping a claim without calling [`resolve`](Self::resolve) resolves
/// the outcome as [`PasteError::Dropped`] so the caller never hangs.
#[must_use = "a claim resolves the outcome as dropped unless `resolve` is called"]
pub struct OutcomeClaim {
    inner: Arc<CellInner>,
}

impl OutcomeClaim {
    /// Deliver the outcome to the caller.
    pub fn resolve(self, outcome: PasteOutcome) {
        self.send(outcome);
    }

    fn send(&self, outcome: PasteOutcome) {
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            // The caller may have stopped listening; that is not an error.
            let _ = sender.send(outcome);
        }
    }
}

impl Drop for OutcomeClaim {
    fn drop(&mut self) {
        self.send(PasteOutcome::failed(PasteError::Dropped));
    }
}

/// Caller's view of a request's outcome.
#[derive(Debug)]
pub struct PasteHandle {
    id: RequestId,
    receiver: Option<oneshot::Receiver<PasteOutcome>>,
    resolved: Option<PasteOutcome>,
}

impl PasteHandle {
    /// The request this handle tracks.
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Non-blocking check for the outcome.
    ///
    /// Returns `None` while the request is still in flight.
    pub fn try_outcome(&mut self) -> Option<&PasteOutcome> {
        if self.resolved.is_none() {
            let received = match self.receiver.as_mut()?.try_recv() {
                Ok(outcome) => outcome,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => PasteOutcome::failed(PasteError::Dropped),
            };
            self.receiver = None;
            self.resolved = Some(received);
        }
        self.resolved.as_ref()
    }

    /// Wait for the outcome.
    pub async fn outcome(mut self) -> PasteOutcome {
        if let Some(outcome) = self.resolved.take() {
            return outcome;
        }
        let Some(receiver) = self.receiver.take() else {
            return PasteOutcome::failed(PasteError::Dropped);
        };
        receiver
            .await
            .unwrap_or_else(|_closed| PasteOutcome::failed(PasteError::Dropped))
    }

    /// Wait for the outcome and reduce it to `true` on success.
    pub async fn succeeded(self) -> bool {
        self.outcome().await.is_success()
    }
}
