//! Lock-guarded engine over a store and its snapshot backend
//!
//! Initialize once at startup, share by reference (or `Arc`) across handlers.
//!
//! ```rust,ignore
//! let engine = WingEngine::open_file(&config.snapshot_path())?;
//! let stored = engine.store_atom(&["coding".into(), "elixir".into()], &json!({"note": "..."}), None)?;
//! let hits = engine.search_atoms("genserver", None, None)?;
//! ```
//!
//! Mutations take the write lock and flush before releasing it, so two
//! writers never interleave. Searches and research share the read lock; the
//! counters they bump are atomic.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

use crate::digest::canonical_payload;
use crate::error::{Result, StoreError};
use crate::persistence::{self, JsonFileSnapshot, MemorySnapshot, SnapshotBackend};
use crate::research::{self, DEFAULT_MAX_ATOMS};
use crate::search::{self, SearchOptions, DEFAULT_SEARCH_LIMIT};
use crate::store::{KnowledgeStore, StatsReport};
use crate::types::{
    Atom, AtomType, ConsolidationLevel, IntegrityReport, ResearchReport, SearchHit, StoredAtom,
    WingSummary,
};

pub struct WingEngine {
    store: RwLock<KnowledgeStore>,
    backend: Box<dyn SnapshotBackend>,
}

impl WingEngine {
    /// Load from `backend`, seeding the default taxonomy on first run.
    pub fn open(backend: impl SnapshotBackend + 'static) -> Result<Self> {
        let store = persistence::open_or_seed(&backend)?;
        Ok(Self {
            store: RwLock::new(store),
            backend: Box::new(backend),
        })
    }

    pub fn open_file(path: &Path) -> Result<Self> {
        Self::open(JsonFileSnapshot::new(path))
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(MemorySnapshot::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, KnowledgeStore>> {
        self.store.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, KnowledgeStore>> {
        self.store.write().map_err(|_| StoreError::LockPoisoned)
    }

    /// Store a payload and flush the snapshot.
    ///
    /// On `PersistenceWrite` the atom is already in memory; call [`flush`](Self::flush)
    /// to retry durability instead of storing again.
    pub fn store_atom<P: Serialize + ?Sized>(
        &self,
        wing_path: &[String],
        payload: &P,
        atom_type: Option<AtomType>,
    ) -> Result<StoredAtom> {
        let payload = canonical_payload(payload)?;
        let mut store = self.write()?;
        let atom_id = store.insert(wing_path, atom_type.unwrap_or_default(), payload)?;
        if let Err(e) = self.backend.save(&store) {
            warn!(atom_id = %atom_id, error = %e, "Atom stored in memory but not persisted");
            return Err(e);
        }
        Ok(StoredAtom { atom_id })
    }

    /// Ranked search; `limit` defaults to 50.
    pub fn search_atoms(
        &self,
        query: &str,
        wing_paths: Option<&[Vec<String>]>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let options = SearchOptions {
            wing_filters: wing_paths.map(<[_]>::to_vec).unwrap_or_default(),
            limit: limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            scan_limit: None,
        };
        let store = self.read()?;
        Ok(search::search(&store, query, &options))
    }

    /// Bounded research; `max_atoms` defaults to 1000.
    pub fn deep_research(
        &self,
        topic: &str,
        max_atoms: Option<usize>,
        level: ConsolidationLevel,
    ) -> Result<ResearchReport> {
        let store = self.read()?;
        Ok(research::research(
            &store,
            topic,
            max_atoms.unwrap_or(DEFAULT_MAX_ATOMS),
            level,
        ))
    }

    /// The full store as it would be written to the snapshot
    pub fn wing_structure(&self) -> Result<Value> {
        let store = self.read()?;
        Ok(serde_json::to_value(&*store)?)
    }

    /// One atom by ID. Does not count as an access.
    pub fn get_atom(&self, atom_id: &str) -> Result<Atom> {
        let store = self.read()?;
        store
            .atom(atom_id)
            .cloned()
            .ok_or_else(|| StoreError::AtomNotFound(atom_id.to_string()))
    }

    pub fn list_wings(&self, filter: Option<&[String]>) -> Result<Vec<WingSummary>> {
        Ok(self.read()?.list_wings(filter))
    }

    pub fn stats(&self) -> Result<StatsReport> {
        Ok(self.read()?.stats_report())
    }

    pub fn verify_atoms(&self) -> Result<IntegrityReport> {
        Ok(self.read()?.verify_integrity())
    }

    /// Write the current state, e.g. after a failed flush or to persist access counts.
    pub fn flush(&self) -> Result<()> {
        let store = self.write()?;
        self.backend.save(&store)
    }

    /// Run `f` with shared access to the store
    pub fn with_store<R>(&self, f: impl FnOnce(&KnowledgeStore) -> R) -> Result<R> {
        let store = self.read()?;
        Ok(f(&store))
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }
}
