//! Per-request paste options.
//!
//! A [`PasteOptions`] value is an immutable snapshot taken from the
//! configuration when a request is created. Values are clamped into their
//! supported ranges at that point.

use crate::capability::SessionFlags;
use crate::config::PerformanceConfig;

/// Lower bound on units processed per tick by a chunked paste.
pub const MIN_UNITS_PER_TICK: u64 = 100;

/// Smallest accepted chunk-size hint.
pub const MIN_CHUNK_SIZE: u32 = 4;

/// Largest accepted chunk-size hint.
pub const MAX_CHUNK_SIZE: u32 = 32;

/// Smallest accepted timeout in seconds.
pub const MIN_TIMEOUT_SECONDS: u32 = 10;

/// Largest accepted timeout in seconds.
pub const MAX_TIMEOUT_SECONDS: u32 = 300;

/// Placement and scheduling options for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasteOptions {
    /// Allow the chunked strategy.
    pub async_enabled: bool,
    /// Units per tick for the chunked strategy (`>= MIN_UNITS_PER_TICK`).
    pub max_units_per_tick: u64,
    /// Chunk edge length used by the strategy threshold (4..=32).
    pub chunk_size_hint: u32,
    /// Chunked apply deadline in seconds (10..=300).
    pub timeout_seconds: u32,
    /// Leave existing blocks where the structure has air.
    pub ignore_air_blocks: bool,
    /// Forwarded to the world; never interpreted by the scheduler.
    pub session_flags: SessionFlags,
}

impl PasteOptions {
    /// Snapshot and clamp the performance section of the configuration.
    pub fn from_config(config: &PerformanceConfig) -> Self {
        Self {
            async_enabled: config.async_operations,
            max_units_per_tick: u64::from(config.max_blocks_per_tick).max(MIN_UNITS_PER_TICK),
            chunk_size_hint: config.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE),
            timeout_seconds: config
                .timeout_seconds
                .clamp(MIN_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS),
            ignore_air_blocks: config.ignore_air_blocks,
            session_flags: SessionFlags {
                skip_light_updates: config.skip_light_updates,
                skip_physics: config.skip_physics,
            },
        }
    }

    /// Units per tick with the floor re-applied, for values built by hand.
    pub fn effective_units_per_tick(&self) -> u64 {
        self.max_units_per_tick.max(MIN_UNITS_PER_TICK)
    }
}

impl Default for PasteOptions {
    fn default() -> Self {
        Self::from_config(&PerformanceConfig::default())
    }
}
