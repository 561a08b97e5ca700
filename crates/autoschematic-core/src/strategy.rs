//! Immediate-versus-chunked strategy selection.
//!
//! Small structures are applied inside a single tick. Larger ones would
//! starve the tick loop, so they are spread across many ticks. The
//! threshold is a heuristic: either strategy is correct for any volume.

use std::fmt;

use crate::options::PasteOptions;

/// How a paste is driven to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasteStrategy {
    /// Apply everything inside one owner-thread task.
    Immediate,
    /// Apply a bounded number of units per tick, racing a timeout.
    Chunked,
}

impl fmt::Display for PasteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("immediate"),
            Self::Chunked => f.write_str("chunked"),
        }
    }
}

/// Volume above which a paste is chunked: `chunk_size_hint^2 * 2`.
pub fn chunk_threshold(options: &PasteOptions) -> u64 {
    let edge = u64::from(options.chunk_size_hint);
    edge.saturating_mul(edge).saturating_mul(2)
}

/// Pick the strategy for a region of `region_volume` blocks.
///
/// Pure: the result depends only on the arguments.
pub fn decide(region_volume: u64, options: &PasteOptions) -> PasteStrategy {
    if options.async_enabled && region_volume > chunk_threshold(options) {
        PasteStrategy::Chunked
    } else {
        PasteStrategy::Immediate
    }
}
