//! Spatial partitioning for worlds: a fixed-size grid kept as a world module
//! and fed by proxy components.
//!
//! # Invariants
//! - An object is in the grid exactly while at least one of its
//!   [`SpatialProxy`] components is active.
//! - The grid reflects global transforms as of the last transform
//!   propagation; queries made before post-transform see last frame's
//!   placement for moved objects.

mod grid;
mod spatial;

pub use grid::{CellCoord, GridPartition};
pub use spatial::{CellChanged, DEFAULT_CELL_SIZE, SpatialGridModule, SpatialProxies, SpatialProxy};
