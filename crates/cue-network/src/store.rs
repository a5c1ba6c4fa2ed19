//! Persistence collaborator — path-addressed peer snapshots.
//!
//! The core hands over an opaque `PeerSnapshot` and a path. Where it lands is
//! the store's business: local JSON files today, anything else tomorrow.

use cue_core::{Error, PeerSnapshot, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved at `path` yet.
    fn load(&self, path: &str) -> Result<Option<PeerSnapshot>>;

    fn save(&self, path: &str, snapshot: &PeerSnapshot) -> Result<()>;
}

fn store_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::collaborator("store", format!("{}: {}", path.display(), e))
}

/// JSON files under a base directory, written atomically (temp file + rename).
pub struct LocalFsStore {
    base_dir: PathBuf,
}

impl LocalFsStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.base_dir.join(path)
    }
}

impl SnapshotStore for LocalFsStore {
    fn load(&self, path: &str) -> Result<Option<PeerSnapshot>> {
        let file = self.resolve(path);
        if !file.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&file).map_err(|e| store_error(&file, e))?;
        let snapshot = serde_json::from_str(&content).map_err(|e| store_error(&file, e))?;
        debug!("Loaded snapshot {}", file.display());
        Ok(Some(snapshot))
    }

    fn save(&self, path: &str, snapshot: &PeerSnapshot) -> Result<()> {
        let file = self.resolve(path);
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_else(|| self.base_dir.clone());
        std::fs::create_dir_all(&dir).map_err(|e| store_error(&dir, e))?;

        let json = serde_json::to_string_pretty(snapshot).map_err(|e| store_error(&file, e))?;
        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        std::fs::write(&tmp, json).map_err(|e| store_error(&tmp, e))?;
        std::fs::rename(&tmp, &file).map_err(|e| store_error(&file, e))?;
        Ok(())
    }
}

/// In-process store for tests and throwaway simulations.
#[derive(Default)]
pub struct MemoryStore {
    snapshots: DashMap<String, PeerSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.snapshots.contains_key(path)
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, path: &str) -> Result<Option<PeerSnapshot>> {
        Ok(self.snapshots.get(path).map(|s| s.value().clone()))
    }

    fn save(&self, path: &str, snapshot: &PeerSnapshot) -> Result<()> {
        self.snapshots.insert(path.to_string(), snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PeerSnapshot {
        PeerSnapshot {
            credential_id: "pk".into(),
            private_key: "sk".into(),
            entity_states: vec![],
            agent: None,
        }
    }

    #[test]
    fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());
        assert!(store.load("peer-1.json").unwrap().is_none());
        store.save("peer-1.json", &snapshot()).unwrap();
        assert_eq!(store.load("peer-1.json").unwrap(), Some(snapshot()));
    }

    #[test]
    fn fs_store_creates_nested_dirs_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());
        store.save("peers/a/state.json", &snapshot()).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("peers/a")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn fs_store_corrupt_file_is_collaborator_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let store = LocalFsStore::new(dir.path());
        assert!(store.load("bad.json").unwrap_err().is_collaborator());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.save("p", &snapshot()).unwrap();
        assert!(store.contains("p"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.load("p").unwrap(), Some(snapshot()));
        assert!(store.load("q").unwrap().is_none());
    }
}
