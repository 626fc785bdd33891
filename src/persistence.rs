//! Snapshot persistence
//!
//! The whole store is one JSON document. Writes go to a sibling temp file
//! that is fsynced and renamed over the target, so readers only ever see a
//! complete snapshot. A missing file is the only read failure that falls back
//! to a fresh store.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::store::KnowledgeStore;

/// Where a store's snapshot lives
pub trait SnapshotBackend: Send + Sync {
    /// `Ok(None)` when no snapshot has been written yet
    fn load(&self) -> Result<Option<KnowledgeStore>>;

    /// Replace the snapshot with the current store
    fn save(&self, store: &KnowledgeStore) -> Result<()>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// Load the snapshot, or seed and persist the default taxonomy if none exists.
pub fn open_or_seed(backend: &dyn SnapshotBackend) -> Result<KnowledgeStore> {
    match backend.load()? {
        Some(store) => {
            info!(
                location = %backend.location(),
                wings = store.wings().len(),
                atoms = store.atoms().len(),
                "Loaded wing store"
            );
            Ok(store)
        }
        None => {
            let store = KnowledgeStore::with_default_taxonomy();
            backend.save(&store)?;
            info!(location = %backend.location(), "Seeded new wing store with default taxonomy");
            Ok(store)
        }
    }
}

fn decode(bytes: &[u8], path: &Path) -> Result<KnowledgeStore> {
    let mut store: KnowledgeStore =
        serde_json::from_slice(bytes).map_err(|e| StoreError::PersistenceRead {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
    store.refresh_counts();
    Ok(store)
}

fn encode(store: &KnowledgeStore, path: &Path) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(store).map_err(|e| StoreError::PersistenceWrite {
        path: path.to_path_buf(),
        source: std::io::Error::new(ErrorKind::InvalidData, e),
    })
}

/// Snapshot stored as a JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        let result = (|| {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
            return result;
        }
        self.sync_parent_dir();
        Ok(())
    }

    /// Persist the rename itself. Directories cannot be opened for sync on
    /// every platform, so failures here are only logged.
    fn sync_parent_dir(&self) {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            debug!(dir = ?dir, error = %e, "Directory sync skipped");
        }
    }
}

impl SnapshotBackend for JsonFileSnapshot {
    fn load(&self) -> Result<Option<KnowledgeStore>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::PersistenceRead {
                    path: self.path.clone(),
                    source: Box::new(e),
                })
            }
        };
        decode(&bytes, &self.path).map(Some)
    }

    fn save(&self, store: &KnowledgeStore) -> Result<()> {
        let bytes = encode(store, &self.path)?;
        self.write_atomically(&bytes).map_err(|source| {
            warn!(path = ?self.path, error = %source, "Snapshot write failed");
            StoreError::PersistenceWrite {
                path: self.path.clone(),
                source,
            }
        })?;
        info!(
            path = ?self.path,
            atoms = store.atoms().len(),
            wings = store.wings().len(),
            bytes = bytes.len(),
            "Snapshot written"
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Snapshot held in memory as serialized JSON; for tests and embedding
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot document
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes)),
        }
    }

    /// Copy of the last saved document
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.bytes.lock().ok().and_then(|b| b.clone())
    }
}

impl SnapshotBackend for MemorySnapshot {
    fn load(&self) -> Result<Option<KnowledgeStore>> {
        let guard = self.bytes.lock().map_err(|_| StoreError::LockPoisoned)?;
        guard
            .as_deref()
            .map(|bytes| decode(bytes, Path::new("<memory>")))
            .transpose()
    }

    fn save(&self, store: &KnowledgeStore) -> Result<()> {
        let bytes = encode(store, Path::new("<memory>"))?;
        let mut guard = self.bytes.lock().map_err(|_| StoreError::LockPoisoned)?;
        *guard = Some(bytes);
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}
