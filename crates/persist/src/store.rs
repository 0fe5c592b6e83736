//! File-backed snapshot store.
//!
//! Layout inside the store directory:
//! ```text
//! store.meta.json             - metadata and schema version
//! snapshots/
//!   000001.snapshot.cbor.zst  - CBOR+zstd compressed scene snapshots
//! integrity/
//!   manifest.json             - hash chain manifest
//! ```

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SnapshotError;
use crate::snapshot::SceneSnapshot;

/// Current snapshot schema version.
const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Metadata stored in store.meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub snapshot_schema_version: u32,
    pub snapshot_count: u32,
}

/// A single entry in the integrity manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub snapshot_id: uuid::Uuid,
    pub frame: u64,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Integrity manifest tracking all snapshot hashes in a chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

/// Directory of numbered snapshots with schema versioning and integrity
/// checking.
pub struct SnapshotStore {
    root: PathBuf,
    meta: StoreMeta,
    manifest: IntegrityManifest,
}

impl SnapshotStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("snapshots"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join("store.meta.json");
        let manifest_path = root.join("integrity").join("manifest.json");

        let (meta, manifest) = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.snapshot_schema_version != SNAPSHOT_SCHEMA_VERSION {
                return Err(SnapshotError::SchemaMismatch {
                    file_version: meta.snapshot_schema_version,
                    expected_version: SNAPSHOT_SCHEMA_VERSION,
                });
            }
            let manifest: IntegrityManifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (meta, manifest)
        } else {
            let meta = StoreMeta {
                snapshot_schema_version: SNAPSHOT_SCHEMA_VERSION,
                snapshot_count: 0,
            };
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            (meta, manifest)
        };

        tracing::debug!(root = %root.display(), snapshots = meta.snapshot_count, "snapshot store opened");
        Ok(Self {
            root,
            meta,
            manifest,
        })
    }

    /// Write a snapshot as the next numbered file. Returns its index.
    pub fn save(&mut self, snapshot: &SceneSnapshot) -> Result<u32, SnapshotError> {
        let index = self.meta.snapshot_count + 1;
        let filename = snapshot_filename(index);
        let path = self.root.join("snapshots").join(&filename);

        let compressed = encode(snapshot)?;
        let hash = sha256_hex(&compressed);
        let prev_hash = self.manifest.entries.last().map(|e| e.sha256.clone());

        std::fs::write(&path, &compressed)?;

        self.meta.snapshot_count = index;
        self.manifest.entries.push(ManifestEntry {
            filename,
            snapshot_id: snapshot.id,
            frame: snapshot.frame,
            sha256: hash,
            prev_hash,
        });
        self.save_meta()?;
        self.save_manifest()?;
        tracing::info!(index, id = %snapshot.id, bytes = compressed.len(), "snapshot saved");
        Ok(index)
    }

    /// Load snapshot `index` (1-based), verifying its hash first.
    pub fn load(&self, index: u32) -> Result<SceneSnapshot, SnapshotError> {
        if index == 0 || index > self.meta.snapshot_count {
            return Err(SnapshotError::NotFound(index));
        }
        let filename = snapshot_filename(index);
        let compressed = std::fs::read(self.root.join("snapshots").join(&filename))?;
        self.verify_file_hash(&filename, &compressed)?;
        decode(&compressed)
    }

    pub fn load_latest(&self) -> Result<SceneSnapshot, SnapshotError> {
        if self.meta.snapshot_count == 0 {
            return Err(SnapshotError::NoSnapshots);
        }
        self.load(self.meta.snapshot_count)
    }

    /// Verify every file hash and the chain linking them.
    pub fn verify_integrity(&self) -> Result<(), SnapshotError> {
        let mut prev_hash: Option<String> = None;
        for entry in &self.manifest.entries {
            if entry.prev_hash != prev_hash {
                return Err(SnapshotError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: prev_hash.unwrap_or_else(|| "None".into()),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }
            let data = std::fs::read(self.root.join("snapshots").join(&entry.filename))?;
            let actual = sha256_hex(&data);
            if actual != entry.sha256 {
                return Err(SnapshotError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
            prev_hash = Some(entry.sha256.clone());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    pub fn manifest(&self) -> &IntegrityManifest {
        &self.manifest
    }

    pub fn len(&self) -> u32 {
        self.meta.snapshot_count
    }

    pub fn is_empty(&self) -> bool {
        self.meta.snapshot_count == 0
    }

    fn verify_file_hash(&self, filename: &str, data: &[u8]) -> Result<(), SnapshotError> {
        let actual = sha256_hex(data);
        let entry = self
            .manifest
            .entries
            .iter()
            .find(|e| e.filename == filename)
            .ok_or_else(|| SnapshotError::IntegrityMismatch {
                file: filename.to_string(),
                expected: "a manifest entry".into(),
                actual: "none".into(),
            })?;
        if entry.sha256 != actual {
            tracing::warn!(file = filename, "snapshot hash mismatch");
            return Err(SnapshotError::IntegrityMismatch {
                file: filename.to_string(),
                expected: entry.sha256.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn save_meta(&self) -> Result<(), SnapshotError> {
        let path = self.root.join("store.meta.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), SnapshotError> {
        let path = self.root.join("integrity").join("manifest.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.manifest)?;
        Ok(())
    }
}

fn snapshot_filename(index: u32) -> String {
    format!("{index:06}.snapshot.cbor.zst")
}

/// Encode a snapshot as zstd-compressed CBOR.
pub fn encode(snapshot: &SceneSnapshot) -> Result<Vec<u8>, SnapshotError> {
    let mut cbor = Vec::new();
    ciborium::into_writer(snapshot, &mut cbor).map_err(|e| SnapshotError::CborEncode(e.to_string()))?;
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(&cbor)?;
    Ok(encoder.finish()?)
}

/// Decode bytes produced by [`encode`].
pub fn decode(data: &[u8]) -> Result<SceneSnapshot, SnapshotError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut cbor = Vec::new();
    decoder.read_to_end(&mut cbor)?;
    ciborium::from_reader(cbor.as_slice()).map_err(|e| SnapshotError::CborDecode(e.to_string()))
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use worldspace_common::Transform;
    use worldspace_kernel::{GameObjectDesc, World, WorldConfig};

    fn snapshot_of(count: usize) -> SceneSnapshot {
        let mut world = World::new(WorldConfig::default()).unwrap();
        for i in 0..count {
            world
                .create_object(
                    GameObjectDesc::new()
                        .named(format!("object {i}"))
                        .with_transform(Transform::from_position(Vec3::splat(i as f32))),
                )
                .unwrap();
        }
        world.update();
        SceneSnapshot::capture(&world).unwrap()
    }

    #[test]
    fn open_creates_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(tmp.path().join("scene")).unwrap();
        assert!(store.is_empty());
        assert!(store.root().join("snapshots").is_dir());
        assert!(store.root().join("integrity").is_dir());
        assert!(matches!(store.load_latest(), Err(SnapshotError::NoSnapshots)));
    }

    #[test]
    fn save_and_load_after_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene");
        let first = snapshot_of(2);
        let second = snapshot_of(3);
        {
            let mut store = SnapshotStore::open(&path).unwrap();
            assert_eq!(store.save(&first).unwrap(), 1);
            assert_eq!(store.save(&second).unwrap(), 2);
        }

        let store = SnapshotStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.load(1).unwrap(), first);
        assert_eq!(store.load_latest().unwrap(), second);
        assert!(matches!(store.load(3), Err(SnapshotError::NotFound(3))));
        store.verify_integrity().unwrap();
        assert_eq!(store.manifest().entries[1].prev_hash.as_deref(), Some(store.manifest().entries[0].sha256.as_str()));
    }

    #[test]
    fn corruption_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene");
        let mut store = SnapshotStore::open(&path).unwrap();
        store.save(&snapshot_of(1)).unwrap();

        let file = path.join("snapshots").join(snapshot_filename(1));
        let mut data = std::fs::read(&file).unwrap();
        if let Some(byte) = data.last_mut() {
            *byte ^= 0xff;
        }
        std::fs::write(&file, &data).unwrap();

        let store = SnapshotStore::open(&path).unwrap();
        assert!(store.verify_integrity().is_err());
        assert!(matches!(
            store.load(1),
            Err(SnapshotError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn schema_mismatch_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("scene");
        let _store = SnapshotStore::open(&path).unwrap();

        let meta_path = path.join("store.meta.json");
        let mut meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path).unwrap()).unwrap();
        meta.snapshot_schema_version = 999;
        serde_json::to_writer_pretty(std::fs::File::create(&meta_path).unwrap(), &meta).unwrap();

        match SnapshotStore::open(&path) {
            Err(SnapshotError::SchemaMismatch {
                file_version,
                expected_version,
            }) => {
                assert_eq!(file_version, 999);
                assert_eq!(expected_version, SNAPSHOT_SCHEMA_VERSION);
            }
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn encoded_bytes_decode_to_the_same_snapshot() {
        let snapshot = snapshot_of(4);
        let bytes = encode(&snapshot).unwrap();
        assert_eq!(decode(&bytes).unwrap(), snapshot);
        assert!(matches!(decode(b"not a snapshot"), Err(SnapshotError::Io(_))));
    }
}
