//! Shared value types for the `AutoSchematic` paste scheduler.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed identifiers (UUID v7 newtypes).
//! - [`position`] -- Block coordinates and inclusive block bounds.

pub mod ids;
pub mod position;

pub use ids::RequestId;
pub use position::{BlockPos, Bounds};
