//! Fakes for driving the scheduler without a real world.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use autoschematic_types::{BlockPos, Bounds};

use crate::capability::{
    Clipboard, ClipboardSource, DecodeError, EditSession, OperationError, PasteOperation,
    SessionError, SessionFlags, WorldHandle,
};

/// Shared counters observed by tests.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub(crate) loads: AtomicU64,
    pub(crate) opens: AtomicU64,
    pub(crate) closes: AtomicU64,
    pub(crate) writes: AtomicU64,
    pub(crate) advance_calls: AtomicU64,
    pub(crate) fail_open: AtomicBool,
    pub(crate) fail_close: AtomicBool,
}

impl Tally {
    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::SeqCst)
    }
}

/// Behaviour of a [`FakeOperation`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct OpScript {
    /// Units; also the clipboard volume.
    pub(crate) total: u64,
    /// Fail when processing would pass this many units.
    pub(crate) fail_after: Option<u64>,
    /// Never make progress.
    pub(crate) stall: bool,
}

impl OpScript {
    pub(crate) fn units(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }
}

pub(crate) struct FakeOperation {
    script: OpScript,
    processed: u64,
    tally: Arc<Tally>,
}

impl FakeOperation {
    pub(crate) const fn new(script: OpScript, tally: Arc<Tally>) -> Self {
        Self {
            script,
            processed: 0,
            tally,
        }
    }
}

impl PasteOperation for FakeOperation {
    fn total_units(&self) -> u64 {
        self.script.total
    }

    fn advance_by(
        &mut self,
        session: &mut dyn EditSession,
        max_units: u64,
    ) -> Result<u64, OperationError> {
        self.tally.advance_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.stall {
            return Ok(0);
        }
        let remaining = self.script.total.saturating_sub(self.processed);
        let n = remaining.min(max_units);
        let processed = self.processed;
        if self
            .script
            .fail_after
            .is_some_and(|limit| processed.saturating_add(n) > limit)
        {
            return Err(OperationError::new("block rejected"));
        }
        for _ in 0..n {
            session.set_block(BlockPos::default(), "minecraft:stone")?;
        }
        self.processed = self.processed.saturating_add(n);
        Ok(n)
    }

    fn is_complete(&self) -> bool {
        self.processed >= self.script.total
    }
}

pub(crate) struct FakeSession {
    tally: Arc<Tally>,
}

impl EditSession for FakeSession {
    fn set_block(&mut self, _pos: BlockPos, _block: &str) -> Result<(), OperationError> {
        self.tally.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.tally.closes.fetch_add(1, Ordering::SeqCst);
        if self.tally.fail_close.load(Ordering::SeqCst) {
            return Err(SessionError::new("commit rejected"));
        }
        Ok(())
    }
}

pub(crate) fn session(tally: &Arc<Tally>) -> Box<dyn EditSession> {
    Box::new(FakeSession {
        tally: Arc::clone(tally),
    })
}

pub(crate) struct FakeClipboard {
    script: OpScript,
    tally: Arc<Tally>,
}

impl Clipboard for FakeClipboard {
    fn region_volume(&self) -> u64 {
        self.script.total
    }

    fn footprint(&self, origin: BlockPos) -> Option<Bounds> {
        let edge = u32::try_from(self.script.total.max(1)).unwrap_or(u32::MAX);
        Bounds::from_origin_and_size(origin, edge, 1, 1)
    }

    fn into_paste(
        self: Box<Self>,
        _origin: BlockPos,
        _ignore_air_blocks: bool,
    ) -> Result<Box<dyn PasteOperation>, OperationError> {
        Ok(Box::new(FakeOperation::new(self.script, self.tally)))
    }
}

/// Source that hands out fake clipboards, or fails to decode.
pub(crate) struct FakeSource {
    pub(crate) script: OpScript,
    pub(crate) fail_decode: bool,
    pub(crate) tally: Arc<Tally>,
}

impl ClipboardSource for FakeSource {
    fn load(&self, _path: &Path) -> Result<Box<dyn Clipboard>, DecodeError> {
        self.tally.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_decode {
            return Err(DecodeError::Malformed {
                reason: "truncated block data".to_owned(),
            });
        }
        Ok(Box::new(FakeClipboard {
            script: self.script,
            tally: Arc::clone(&self.tally),
        }))
    }
}

pub(crate) struct FakeWorld {
    pub(crate) tally: Arc<Tally>,
}

impl WorldHandle for FakeWorld {
    fn name(&self) -> &str {
        "fake"
    }

    fn open_session(&self, _flags: SessionFlags) -> Result<Box<dyn EditSession>, OperationError> {
        self.tally.opens.fetch_add(1, Ordering::SeqCst);
        if self.tally.fail_open.load(Ordering::SeqCst) {
            return Err(OperationError::new("world is read-only"));
        }
        Ok(session(&self.tally))
    }
}
