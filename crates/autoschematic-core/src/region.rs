//! Per-region mutual exclusion for in-flight pastes.
//!
//! Two requests whose footprints overlap would otherwise interleave their
//! writes across ticks. A request must hold a [`RegionGuard`] for its
//! footprint from apply entry until its terminal transition; an
//! overlapping request is refused rather than queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use autoschematic_types::Bounds;

/// Registry of footprints currently being written.
#[derive(Debug, Default)]
pub struct RegionLocks {
    held: Mutex<Vec<(u64, Bounds)>>,
    next_token: AtomicU64,
}

impl RegionLocks {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Bounds)>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve `bounds`, or return `None` if it overlaps a held region.
    pub fn try_acquire(self: &Arc<Self>, bounds: Bounds) -> Option<RegionGuard> {
        let mut held = self.lock();
        if held.iter().any(|(_, other)| other.intersects(&bounds)) {
            return None;
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        held.push((token, bounds));
        Some(RegionGuard {
            locks: Arc::clone(self),
            token,
            bounds,
        })
    }

    /// Number of regions currently held.
    pub fn held_count(&self) -> usize {
        self.lock().len()
    }
}

/// Reservation of one footprint; released on drop.
#[derive(Debug)]
pub struct RegionGuard {
    locks: Arc<RegionLocks>,
    token: u64,
    bounds: Bounds,
}

impl RegionGuard {
    /// The reserved footprint.
    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }
}

impl Drop for RegionGuard {
    fn drop(&mut self) {
        let token = self.token;
        self.locks.lock().retain(|(held, _)| *held != token);
    }
}

#[cfg(test)]
mod tests {
    use autoschematic_types::BlockPos;

    use super::*;

    fn cube(x: i32, size: u32) -> Bounds {
        Bounds::from_origin_and_size(BlockPos::new(x, 0, 0), size, size, size).unwrap_or_else(|| {
            Bounds::from_corners(BlockPos::new(x, 0, 0), BlockPos::new(x, 0, 0))
        })
    }

    #[test]
    fn overlapping_regions_are_refused() {
        let locks = Arc::new(RegionLocks::new());
        let first = locks.try_acquire(cube(0, 10));
        assert!(first.is_some());
        assert!(locks.try_acquire(cube(5, 10)).is_none());
        assert!(locks.try_acquire(cube(10, 10)).is_some());
    }

    #[test]
    fn dropping_the_guard_releases_the_region() {
        let locks = Arc::new(RegionLocks::new());
        let guard = locks.try_acquire(cube(0, 4));
        assert_eq!(locks.held_count(), 1);
        drop(guard);
        assert_eq!(locks.held_count(), 0);
        assert!(locks.try_acquire(cube(0, 4)).is_some());
    }
}
