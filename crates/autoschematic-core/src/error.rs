//! Error types for paste requests.
//!
//! Every failure of a paste request is converted into a [`PasteFailure`]
//! at its point of origin and delivered through the request's outcome.
//! Nothing here is ever propagated across the request boundary.

use std::fmt;
use std::path::PathBuf;

use autoschematic_types::Bounds;

/// Coarse failure classification that callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The schematic name did not resolve to any existing file.
    NotFound,
    /// The clipboard reader rejected the file.
    Decode,
    /// The paste operation or edit session failed while applying.
    Apply,
    /// The chunked apply exceeded its deadline.
    Timeout,
    /// Closing the edit session failed after an otherwise clean apply.
    SessionClose,
    /// Another in-flight paste already holds an overlapping region.
    RegionBusy,
    /// The scheduler discarded the request before it resolved.
    Dropped,
}

/// Primary cause of a failed paste request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasteError {
    /// File resolution found nothing under any candidate path.
    #[error("schematic not found (tried: {name} in schematics folder)")]
    NotFound {
        /// The name the caller asked for.
        name: String,
        /// Every candidate path that was checked, in order.
        tried: Vec<PathBuf>,
    },

    /// The clipboard could not be decoded.
    #[error("failed to load schematic {path}: {message}", path = .path.display())]
    Decode {
        /// The resolved file.
        path: PathBuf,
        /// Reader error description.
        message: String,
    },

    /// Opening the session, building the operation, or advancing it failed.
    #[error("paste failed: {message}")]
    Apply {
        /// Description of the failure.
        message: String,
    },

    /// Chunked apply did not finish before its deadline.
    #[error("timeout after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds.
        seconds: u32,
    },

    /// The edit session failed to close.
    #[error("error closing edit session: {message}")]
    SessionClose {
        /// Description of the close failure.
        message: String,
    },

    /// The target footprint overlaps an in-flight paste.
    #[error("target region {bounds} is busy with another paste")]
    RegionBusy {
        /// Footprint this request wanted.
        bounds: Bounds,
    },

    /// The request was discarded without ever being resolved.
    #[error("paste request was dropped before it completed")]
    Dropped,
}

impl PasteError {
    /// Classify this error.
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Decode { .. } => FailureKind::Decode,
            Self::Apply { .. } => FailureKind::Apply,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::SessionClose { .. } => FailureKind::SessionClose,
            Self::RegionBusy { .. } => FailureKind::RegionBusy,
            Self::Dropped => FailureKind::Dropped,
        }
    }
}

/// A failed outcome: the primary cause plus any cleanup failure.
///
/// A cleanup failure is appended to the reported reason and never
/// replaces the cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteFailure {
    cause: PasteError,
    cleanup: Option<String>,
}

impl PasteFailure {
    /// Failure with no cleanup problem.
    pub const fn new(cause: PasteError) -> Self {
        Self {
            cause,
            cleanup: None,
        }
    }

    /// Failure whose edit session also failed to close.
    pub const fn with_cleanup(cause: PasteError, cleanup: String) -> Self {
        Self {
            cause,
            cleanup: Some(cleanup),
        }
    }

    /// The primary cause.
    pub const fn cause(&self) -> &PasteError {
        &self.cause
    }

    /// Classification of the primary cause.
    pub const fn kind(&self) -> FailureKind {
        self.cause.kind()
    }

    /// The session close error reported alongside the cause, if any.
    pub fn cleanup(&self) -> Option<&str> {
        self.cleanup.as_deref()
    }
}

impl fmt::Display for PasteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)?;
        if let Some(cleanup) = &self.cleanup {
            write!(f, "; additionally failed to close edit session: {cleanup}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PasteFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

impl From<PasteError> for PasteFailure {
    fn from(cause: PasteError) -> Self {
        Self::new(cause)
    }
}
