//! Developer tooling: a read-only world inspector.
//!
//! # Invariants
//! - Inspection never mutates the world.

mod inspector;

pub use inspector::{ComponentInfo, ObjectInfo, WorldInspector, WorldSummary};
