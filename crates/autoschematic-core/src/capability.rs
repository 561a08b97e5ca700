//! Capabilities the scheduler drives but does not implement.
//!
//! The scheduler only ever sees these traits. Concrete implementations
//! (schematic decoding, the block world) live outside the core so the
//! chunked state machine can be exercised with fakes.
//!
//! Lifecycle of one request:
//!
//! 1. [`ClipboardSource::load`] decodes a file off the owner thread.
//! 2. [`WorldHandle::open_session`] opens an [`EditSession`] on the owner
//!    thread.
//! 3. [`Clipboard::into_paste`] consumes the clipboard and yields a
//!    [`PasteOperation`]; the clipboard is released with the operation.
//! 4. [`PasteOperation::advance_by`] writes through the session, either to
//!    completion in one tick or in bounded steps across ticks.
//! 5. [`EditSession::close`] commits and releases the session exactly once.

use std::path::Path;

use autoschematic_types::{BlockPos, Bounds};

/// Errors produced by a [`ClipboardSource`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// No reader recognises the file.
    #[error("unsupported format")]
    UnsupportedFormat,

    /// The file decoded to a structure with no blocks.
    #[error("empty schematic")]
    Empty,

    /// The file could not be read.
    #[error("i/o error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The file is recognised but its contents are inconsistent.
    #[error("malformed schematic: {reason}")]
    Malformed {
        /// What was wrong.
        reason: String,
    },
}

/// Failure while opening a session, building, or advancing an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct OperationError {
    /// Description of the failure.
    pub message: String,
}

impl OperationError {
    /// Build an error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure while closing an edit session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SessionError {
    /// Description of the failure.
    pub message: String,
}

impl SessionError {
    /// Build an error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Flags forwarded untouched to [`WorldHandle::open_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionFlags {
    /// Skip lighting recalculation for written blocks.
    pub skip_light_updates: bool,
    /// Skip physics updates (falling blocks, fluids) for written blocks.
    pub skip_physics: bool,
}

/// Resolves a file into a decoded clipboard.
pub trait ClipboardSource: Send + Sync {
    /// Decode the structure stored at `path`.
    ///
    /// Called on a background worker; must not touch the world.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the file is unreadable, of an unknown
    /// format, malformed, or empty.
    fn load(&self, path: &Path) -> Result<Box<dyn Clipboard>, DecodeError>;
}

/// A decoded structure, ready to be pasted.
pub trait Clipboard: Send {
    /// Number of block positions in the structure's region.
    fn region_volume(&self) -> u64;

    /// Blocks the structure would occupy when pasted at `origin`.
    ///
    /// Returns `None` if the footprint leaves the coordinate space.
    fn footprint(&self, origin: BlockPos) -> Option<Bounds>;

    /// Consume the clipboard into an incremental paste at `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError`] if the operation cannot be built.
    fn into_paste(
        self: Box<Self>,
        origin: BlockPos,
        ignore_air_blocks: bool,
    ) -> Result<Box<dyn PasteOperation>, OperationError>;
}

/// An incremental paste, advanced in bounded steps.
pub trait PasteOperation: Send {
    /// Total number of units the operation will process.
    fn total_units(&self) -> u64;

    /// Process at most `max_units` units, writing through `session`.
    ///
    /// Returns the number of units actually processed. Returning `0`
    /// while incomplete means the operation cannot progress this tick.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError`] if a write fails.
    fn advance_by(
        &mut self,
        session: &mut dyn EditSession,
        max_units: u64,
    ) -> Result<u64, OperationError>;

    /// Whether every unit has been processed.
    fn is_complete(&self) -> bool;
}

/// An open batch of world mutations.
pub trait EditSession: Send {
    /// Stage a block write at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError`] if the write is rejected.
    fn set_block(&mut self, pos: BlockPos, block: &str) -> Result<(), OperationError>;

    /// Commit staged writes and release the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the commit fails.
    fn close(&mut self) -> Result<(), SessionError>;
}

/// The world a paste targets.
pub trait WorldHandle: Send + Sync {
    /// Human-readable world name for log lines.
    fn name(&self) -> &str;

    /// Open an edit session. Called on the owner thread only.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError`] if the world refuses a new session.
    fn open_session(&self, flags: SessionFlags) -> Result<Box<dyn EditSession>, OperationError>;
}
