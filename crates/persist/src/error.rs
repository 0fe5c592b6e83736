use worldspace_kernel::{SerializationError, WorldError};

/// Errors from capturing, restoring and storing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("no snapshots found")]
    NoSnapshots,
    #[error("snapshot {0} does not exist")]
    NotFound(u32),
    #[error("object record {index} names parent {parent}, which is not an earlier record")]
    BadParent { index: usize, parent: u32 },
    #[error("no loader registered for component type {0}")]
    UnknownComponentType(String),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
