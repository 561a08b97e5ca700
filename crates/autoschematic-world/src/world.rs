//! In-memory block world.
//!
//! Edit sessions buffer their writes and apply them to the world in one
//! step when closed, so a paste whose session is never closed leaves the
//! world untouched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use autoschematic_core::capability::{
    EditSession, OperationError, SessionError, SessionFlags, WorldHandle,
};
use autoschematic_types::BlockPos;
use tracing::{debug, warn};

use crate::schematic::is_air;

#[derive(Debug, Default)]
struct WorldState {
    blocks: RwLock<HashMap<BlockPos, String>>,
    commits: AtomicU64,
}

impl WorldState {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<BlockPos, String>> {
        self.blocks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<BlockPos, String>> {
        self.blocks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn put(blocks: &mut HashMap<BlockPos, String>, pos: BlockPos, block: &str) {
    if is_air(block) {
        blocks.remove(&pos);
    } else {
        blocks.insert(pos, block.to_owned());
    }
}

/// A sparse world of named blocks. Unset positions are air.
///
/// Clones share the same blocks.
#[derive(Debug, Clone)]
pub struct BlockWorld {
    name: String,
    state: Arc<WorldState>,
}

impl BlockWorld {
    /// An empty world.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(WorldState::default()),
        }
    }

    /// Block at `pos`, or `None` for air.
    pub fn block(&self, pos: BlockPos) -> Option<String> {
        self.state.read().get(&pos).cloned()
    }

    /// Write a block directly, outside any session.
    pub fn place(&self, pos: BlockPos, block: &str) {
        put(&mut self.state.write(), pos, block);
    }

    /// Number of non-air blocks.
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    /// Whether every block is air.
    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    /// Number of sessions committed so far.
    pub fn commits(&self) -> u64 {
        self.state.commits.load(Ordering::Relaxed)
    }
}

impl WorldHandle for BlockWorld {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_session(&self, flags: SessionFlags) -> Result<Box<dyn EditSession>, OperationError> {
        debug!(
            world = %self.name,
            skip_light_updates = flags.skip_light_updates,
            skip_physics = flags.skip_physics,
            "Edit session opened"
        );
        Ok(Box::new(MemoryEditSession {
            world: self.name.clone(),
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            closed: false,
        }))
    }
}

/// Buffered writes against a [`BlockWorld`].
#[derive(Debug)]
pub struct MemoryEditSession {
    world: String,
    state: Arc<WorldState>,
    pending: Vec<(BlockPos, String)>,
    closed: bool,
}

impl EditSession for MemoryEditSession {
    fn set_block(&mut self, pos: BlockPos, block: &str) -> Result<(), OperationError> {
        if self.closed {
            return Err(OperationError::new("edit session is closed"));
        }
        self.pending.push((pos, block.to_owned()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::new("edit session already closed"));
        }
        self.closed = true;
        let writes = self.pending.len();
        {
            let mut blocks = self.state.write();
            for (pos, block) in self.pending.drain(..) {
                put(&mut blocks, pos, &block);
            }
        }
        self.state.commits.fetch_add(1, Ordering::Relaxed);
        debug!(world = %self.world, writes, "Edit session committed");
        Ok(())
    }
}

impl Drop for MemoryEditSession {
    fn drop(&mut self) {
        if !self.closed && !self.pending.is_empty() {
            warn!(
                world = %self.world,
                discarded = self.pending.len(),
                "Edit session dropped without close"
            );
        }
    }
}
