//! Shared value types used by every worldspace crate.

mod types;

pub use types::Transform;
