//! Persistence: scene snapshots and a file-backed snapshot store.
//!
//! Snapshots only touch components through the kernel's serialization
//! boundary (`Component::serialize` / `deserialize` with a per-type version);
//! the on-disk format is this crate's business, not the kernel's.
//!
//! # Invariants
//! - Parents precede their children in a snapshot's object records.
//! - Stored snapshots are content-addressed and verified before decoding.

mod error;
mod snapshot;
mod store;

pub use error::SnapshotError;
pub use snapshot::{ComponentLoaders, ComponentRecord, ObjectRecord, RestoreReport, SceneSnapshot};
pub use store::{IntegrityManifest, ManifestEntry, SnapshotStore, StoreMeta, decode, encode};
