//! Terminal transition shared by every apply path.
//!
//! Whoever wins the outcome claim notifies the sink, writes the single
//! operator log line, and resolves the caller's handle, in that order.

use std::sync::Arc;

use autoschematic_types::{BlockPos, RequestId};
use tracing::{error, info, warn};

use crate::capability::SessionError;
use crate::error::{FailureKind, PasteError, PasteFailure};
use crate::outcome::{OutcomeCell, OutcomeClaim, PasteOutcome, PasteReport};
use crate::sink::{PasteNotice, ResultSink};

/// Per-request resolution context.
pub(crate) struct Completion {
    id: RequestId,
    file: String,
    origin: BlockPos,
    cell: OutcomeCell,
    sink: Option<Arc<dyn ResultSink>>,
}

impl Completion {
    pub(crate) const fn new(
        id: RequestId,
        file: String,
        origin: BlockPos,
        cell: OutcomeCell,
        sink: Option<Arc<dyn ResultSink>>,
    ) -> Self {
        Self {
            id,
            file,
            origin,
            cell,
            sink,
        }
    }

    pub(crate) const fn id(&self) -> RequestId {
        self.id
    }

    pub(crate) const fn origin(&self) -> BlockPos {
        self.origin
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.cell.is_claimed()
    }

    pub(crate) fn try_claim(&self) -> Option<OutcomeClaim> {
        self.cell.try_claim()
    }

    /// Claim and resolve as a failure. Returns `false` if already resolved.
    pub(crate) fn fail(&self, cause: PasteError) -> bool {
        let Some(claim) = self.try_claim() else {
            return false;
        };
        self.finish(claim, PasteOutcome::failed(cause));
        true
    }

    /// Notify, log, and resolve.
    pub(crate) fn finish(&self, claim: OutcomeClaim, outcome: PasteOutcome) {
        if let Some(sink) = &self.sink {
            sink.notify(&PasteNotice::from_outcome(&outcome));
        }
        self.log(&outcome);
        claim.resolve(outcome);
    }

    fn log(&self, outcome: &PasteOutcome) {
        match outcome {
            PasteOutcome::Success(report) => info!(
                request = %self.id,
                file = %self.file,
                x = report.origin.x,
                y = report.origin.y,
                z = report.origin.z,
                strategy = %report.strategy,
                units = report.units,
                ticks = report.ticks,
                "Schematic pasted successfully"
            ),
            PasteOutcome::Failure(failure) => match failure.kind() {
                FailureKind::NotFound => {
                    error!(request = %self.id, file = %self.file, "Schematic file not found");
                }
                FailureKind::Timeout => {
                    error!(request = %self.id, file = %self.file, reason = %failure, "Paste timed out");
                }
                kind => {
                    error!(request = %self.id, file = %self.file, ?kind, reason = %failure, "Paste failed");
                }
            },
        }
    }
}

/// Combine the apply result with the session close result.
///
/// A close failure turns a success into a `SessionClose` failure and is
/// appended to an existing failure.
pub(crate) fn settle(
    id: RequestId,
    result: Result<PasteReport, PasteError>,
    close: Result<(), SessionError>,
) -> PasteOutcome {
    if let Err(err) = &close {
        warn!(request = %id, error = %err, "Error closing edit session");
    }
    match (result, close) {
        (Ok(report), Ok(())) => PasteOutcome::Success(report),
        (Ok(_), Err(err)) => PasteOutcome::failed(PasteError::SessionClose {
            message: err.message,
        }),
        (Err(cause), Ok(())) => PasteOutcome::failed(cause),
        (Err(cause), Err(err)) => {
            PasteOutcome::Failure(PasteFailure::with_cleanup(cause, err.message))
        }
    }
}
