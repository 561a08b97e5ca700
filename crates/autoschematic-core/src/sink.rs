//! Downstream notification of terminal outcomes.
//!
//! A [`ResultSink`] receives one [`PasteNotice`] per request it was
//! attached to. Notification is fire-and-forget: it never changes what
//! the caller's [`PasteHandle`](crate::outcome::PasteHandle) resolves to.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use autoschematic_types::BlockPos;

use crate::error::PasteError;
use crate::outcome::PasteOutcome;

/// User-facing summary of an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteNotice {
    /// The structure landed at `origin`.
    Pasted {
        /// Paste origin.
        origin: BlockPos,
    },
    /// The requested name did not resolve.
    FileNotFound {
        /// Name as requested.
        name: String,
    },
    /// The chunked paste ran out of time.
    TimedOut {
        /// Configured timeout.
        seconds: u32,
    },
    /// Any other failure.
    Failed {
        /// Full failure text, cleanup errors included.
        reason: String,
    },
}

impl PasteNotice {
    /// Summarise an outcome.
    pub fn from_outcome(outcome: &PasteOutcome) -> Self {
        match outcome {
            PasteOutcome::Success(report) => Self::Pasted {
                origin: report.origin,
            },
            PasteOutcome::Failure(failure) => match failure.cause() {
                PasteError::NotFound { name, .. } => Self::FileNotFound { name: name.clone() },
                PasteError::Timeout { seconds } => Self::TimedOut { seconds: *seconds },
                _ => Self::Failed {
                    reason: failure.to_string(),
                },
            },
        }
    }
}

impl fmt::Display for PasteNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pasted { origin } => write!(f, "Schematic pasted at {origin}"),
            Self::FileNotFound { name } => write!(f, "Schematic not found: {name}"),
            Self::TimedOut { seconds } => write!(f, "Paste timed out after {seconds} seconds"),
            Self::Failed { reason } => write!(f, "Error: {reason}"),
        }
    }
}

/// Receiver of terminal notices (a chat sender, a console, a test tally).
pub trait ResultSink: Send + Sync {
    /// Called once per request, on the thread that resolved it.
    fn notify(&self, notice: &PasteNotice);
}

/// Sink that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    notices: Mutex<Vec<PasteNotice>>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far.
    pub fn notices(&self) -> Vec<PasteNotice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResultSink for MemorySink {
    fn notify(&self, notice: &PasteNotice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PasteFailure;

    #[test]
    fn failures_map_to_specific_notices() {
        let not_found = PasteOutcome::failed(PasteError::NotFound {
            name: "spawn".to_owned(),
            tried: Vec::new(),
        });
        assert_eq!(
            PasteNotice::from_outcome(&not_found),
            PasteNotice::FileNotFound {
                name: "spawn".to_owned()
            }
        );

        let timeout = PasteOutcome::Failure(PasteFailure::with_cleanup(
            PasteError::Timeout { seconds: 30 },
            "locked".to_owned(),
        ));
        assert_eq!(
            PasteNotice::from_outcome(&timeout),
            PasteNotice::TimedOut { seconds: 30 }
        );
    }

    #[test]
    fn generic_failure_keeps_cleanup_text() {
        let outcome = PasteOutcome::Failure(PasteFailure::with_cleanup(
            PasteError::Apply {
                message: "boom".to_owned(),
            },
            "close failed".to_owned(),
        ));
        let notice = PasteNotice::from_outcome(&outcome);
        assert!(notice.to_string().contains("boom"));
        assert!(notice.to_string().contains("close failed"));
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.notify(&PasteNotice::TimedOut { seconds: 10 });
        sink.notify(&PasteNotice::Pasted {
            origin: BlockPos::new(0, 64, 0),
        });
        assert_eq!(sink.notices().len(), 2);
        assert_eq!(
            sink.notices().last().map(ToString::to_string),
            Some("Schematic pasted at (0, 64, 0)".to_owned())
        );
    }
}
