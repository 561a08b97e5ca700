//! Block coordinates and inclusive axis-aligned block bounds.
//!
//! All coordinate arithmetic is checked: a footprint that would leave the
//! `i32` coordinate space is reported as `None` rather than wrapping.

use serde::{Deserialize, Serialize};

/// Integer block coordinate in a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    /// East/west axis.
    pub x: i32,
    /// Vertical axis.
    pub y: i32,
    /// North/south axis.
    pub z: i32,
}

impl BlockPos {
    /// Create a position from its three components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Floor a fractional location (e.g. a player position) to the block
    /// that contains it.
    ///
    /// Returns `None` if any component is not finite or falls outside the
    /// `i32` range after flooring.
    pub fn from_floored(x: f64, y: f64, z: f64) -> Option<Self> {
        Some(Self {
            x: floor_to_i32(x)?,
            y: floor_to_i32(y)?,
            z: floor_to_i32(z)?,
        })
    }

    /// Translate this position by the given deltas.
    ///
    /// Returns `None` on coordinate overflow.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        let Some(x) = self.x.checked_add(dx) else {
            return None;
        };
        let Some(y) = self.y.checked_add(dy) else {
            return None;
        };
        let Some(z) = self.z.checked_add(dz) else {
            return None;
        };
        Some(Self { x, y, z })
    }
}

impl core::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Inclusive axis-aligned box of blocks. `min` is component-wise `<= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    min: BlockPos,
    max: BlockPos,
}

impl Bounds {
    /// Build the footprint of a `width x height x length` structure whose
    /// minimum corner sits at `origin`.
    ///
    /// Returns `None` if any dimension is zero or the far corner overflows.
    pub fn from_origin_and_size(origin: BlockPos, width: u32, height: u32, length: u32) -> Option<Self> {
        let dx = extent(width)?;
        let dy = extent(height)?;
        let dz = extent(length)?;
        let max = origin.offset(dx, dy, dz)?;
        Some(Self { min: origin, max })
    }

    /// Build bounds from two arbitrary corners.
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Minimum corner (inclusive).
    pub const fn min(&self) -> BlockPos {
        self.min
    }

    /// Maximum corner (inclusive).
    pub const fn max(&self) -> BlockPos {
        self.max
    }

    /// Whether the two boxes share at least one block.
    pub const fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// Whether `pos` lies inside the box.
    pub const fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// Number of blocks in the box.
    pub fn volume(&self) -> u64 {
        span(self.min.x, self.max.x)
            .saturating_mul(span(self.min.y, self.max.y))
            .saturating_mul(span(self.min.z, self.max.z))
    }
}

impl core::fmt::Display for Bounds {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} -> {}", self.min, self.max)
    }
}

/// Offset from the first to the last block along an axis of `size` blocks.
fn extent(size: u32) -> Option<i32> {
    let last = size.checked_sub(1)?;
    i32::try_from(last).ok()
}

/// Inclusive number of blocks between two coordinates on one axis.
fn span(min: i32, max: i32) -> u64 {
    let diff = i64::from(max).saturating_sub(i64::from(min));
    u64::try_from(diff).map_or(0, |d| d.saturating_add(1))
}

#[allow(clippy::cast_possible_truncation)]
fn floor_to_i32(value: f64) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    let floored = value.floor();
    if floored < f64::from(i32::MIN) || floored > f64::from(i32::MAX) {
        return None;
    }
    // Range checked above.
    Some(floored as i32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn floors_negative_fractions_down() {
        let pos = BlockPos::from_floored(-0.5, 64.9, 10.0).unwrap();
        assert_eq!(pos, BlockPos::new(-1, 64, 10));
    }

    #[test]
    fn rejects_non_finite_positions() {
        assert!(BlockPos::from_floored(f64::NAN, 0.0, 0.0).is_none());
        assert!(BlockPos::from_floored(0.0, f64::INFINITY, 0.0).is_none());
        assert!(BlockPos::from_floored(0.0, 0.0, 1e12).is_none());
    }

    #[test]
    fn footprint_covers_size() {
        let b = Bounds::from_origin_and_size(BlockPos::new(10, 0, -5), 4, 2, 3).unwrap();
        assert_eq!(b.min(), BlockPos::new(10, 0, -5));
        assert_eq!(b.max(), BlockPos::new(13, 1, -3));
        assert_eq!(b.volume(), 24);
    }

    #[test]
    fn zero_sized_footprint_is_rejected() {
        assert!(Bounds::from_origin_and_size(BlockPos::default(), 0, 1, 1).is_none());
    }

    #[test]
    fn overflowing_footprint_is_rejected() {
        let origin = BlockPos::new(i32::MAX, 0, 0);
        assert!(Bounds::from_origin_and_size(origin, 2, 1, 1).is_none());
    }

    #[test]
    fn intersection_is_symmetric_and_touching_counts() {
        let a = Bounds::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(9, 9, 9));
        let b = Bounds::from_corners(BlockPos::new(9, 9, 9), BlockPos::new(20, 20, 20));
        let c = Bounds::from_corners(BlockPos::new(10, 0, 0), BlockPos::new(20, 9, 9));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(!c.intersects(&a));
    }

    #[test]
    fn contains_is_inclusive() {
        let b = Bounds::from_corners(BlockPos::new(2, 2, 2), BlockPos::new(0, 0, 0));
        assert!(b.contains(BlockPos::new(0, 0, 0)));
        assert!(b.contains(BlockPos::new(2, 2, 2)));
        assert!(!b.contains(BlockPos::new(3, 2, 2)));
    }

    #[test]
    fn position_serializes_as_object() {
        let json = serde_json::to_string(&BlockPos::new(1, 2, 3)).unwrap();
        assert_eq!(json, r#"{"x":1,"y":2,"z":3}"#);
    }
}
