//! The knowledge store aggregate
//!
//! Owns every wing and atom. Atoms point back to their wing by ID only, so
//! both collections serialize independently. Snapshot fields this crate does
//! not understand are carried through untouched.

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::digest;
use crate::error::Result;
use crate::types::{Atom, AtomType, IntegrityReport, Wing, WingSummary};
use crate::wing::{self, paths_overlap, to_path, wing_key, DEFAULT_TAXONOMY};

/// Running counters persisted alongside the data
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreStats {
    pub total_atoms: u64,
    pub total_wings: u64,
    total_searches: AtomicU64,
    total_research: AtomicU64,
    pub last_updated: Option<DateTime<Utc>>,
    /// Counters owned by other tools sharing the snapshot
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoreStats {
    pub fn total_searches(&self) -> u64 {
        self.total_searches.load(Ordering::Relaxed)
    }

    pub fn total_research(&self) -> u64 {
        self.total_research.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the counters, with atom counts per type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub total_atoms: u64,
    pub total_wings: u64,
    pub total_searches: u64,
    pub total_research: u64,
    pub last_updated: Option<DateTime<Utc>>,
    pub atoms_by_type: BTreeMap<String, usize>,
}

/// Atoms in insertion order with an ID index.
///
/// Serializes as `[[id, atom], ...]`.
#[derive(Debug, Default)]
pub struct AtomTable {
    atoms: Vec<Atom>,
    index: HashMap<String, usize>,
}

impl AtomTable {
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Atom> {
        self.index.get(id).map(|&i| &self.atoms[i])
    }

    /// Atoms oldest first
    pub fn iter(&self) -> std::slice::Iter<'_, Atom> {
        self.atoms.iter()
    }

    fn push(&mut self, atom: Atom) {
        match self.index.get(&atom.id) {
            Some(&i) => self.atoms[i] = atom,
            None => {
                self.index.insert(atom.id.clone(), self.atoms.len());
                self.atoms.push(atom);
            }
        }
    }
}

impl Serialize for AtomTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.atoms.len()))?;
        for atom in &self.atoms {
            seq.serialize_element(&(&atom.id, atom))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for AtomTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let pairs: Vec<(String, Atom)> = Vec::deserialize(deserializer)?;
        let mut table = AtomTable::default();
        for (id, mut atom) in pairs {
            if atom.id != id {
                warn!(key = %id, atom_id = %atom.id, "Atom key and id disagree, keeping key");
                atom.id = id;
            }
            if table.index.contains_key(&atom.id) {
                warn!(atom_id = %atom.id, "Duplicate atom key in snapshot, last entry wins");
            }
            atom.refresh_search_text();
            table.push(atom);
        }
        Ok(table)
    }
}

/// Aggregate root owning wings, atoms and counters
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KnowledgeStore {
    #[serde(default)]
    wings: BTreeMap<String, Wing>,
    #[serde(default)]
    atoms: AtomTable,
    #[serde(default)]
    stats: StoreStats,
    /// Top-level snapshot fields owned by other subsystems
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl KnowledgeStore {
    /// Empty store with no wings at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh store seeded with the default taxonomy
    pub fn with_default_taxonomy() -> Self {
        let mut store = Self::new();
        for path in DEFAULT_TAXONOMY {
            let path = to_path(path);
            if let Ok(wing) = Wing::new(path) {
                store.wings.insert(wing.key(), wing);
            }
        }
        store.refresh_counts();
        store
    }

    pub fn wings(&self) -> &BTreeMap<String, Wing> {
        &self.wings
    }

    pub fn wing(&self, path: &[String]) -> Option<&Wing> {
        self.wings.get(&wing_key(path))
    }

    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    pub fn atom(&self, id: &str) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Snapshot fields preserved without interpretation
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Return the wing for `path`, creating only that leaf if absent.
    pub fn ensure_wing(&mut self, path: &[String]) -> Result<&mut Wing> {
        wing::validate_path(path)?;
        match self.wings.entry(wing_key(path)) {
            // Paths that join to the same key share the wing, e.g. ["a_b"] and ["a", "b"]
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let wing = Wing::new(path.to_vec())?;
                debug!(wing = %wing.id, "Created wing");
                self.stats.total_wings += 1;
                Ok(entry.insert(wing))
            }
        }
    }

    /// Store a payload under `wing_path` and return the new atom ID.
    ///
    /// Identical payloads are not deduplicated; each call makes a new atom.
    pub fn insert(&mut self, wing_path: &[String], atom_type: AtomType, payload: Value) -> Result<String> {
        wing::validate_path(wing_path)?;
        let digest = digest::extract(wing_path, &payload)?;

        let id = new_atom_id();
        let wing = self.ensure_wing(wing_path)?;
        let mut atom = Atom::new(id.clone(), digest.hash, atom_type, payload, wing, digest.tags);
        // The atom keeps the caller's path even when the wing was keyed by another one
        atom.wing_path = wing_path.to_vec();
        wing.atoms.push(id.clone());

        self.atoms.push(atom);
        self.stats.total_atoms = self.atoms.len() as u64;
        self.stats.last_updated = Some(chrono::Utc::now());
        debug!(atom_id = %id, wing = %wing_key(wing_path), "Stored atom");
        Ok(id)
    }

    pub(crate) fn record_search(&self) {
        self.stats.total_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_research(&self) {
        self.stats.total_research.fetch_add(1, Ordering::Relaxed);
    }

    /// Recompute derived counters after a load
    pub(crate) fn refresh_counts(&mut self) {
        self.stats.total_atoms = self.atoms.len() as u64;
        self.stats.total_wings = self.wings.len() as u64;
    }

    /// Wing summaries sorted by key, optionally limited to paths overlapping `filter`.
    pub fn list_wings(&self, filter: Option<&[String]>) -> Vec<WingSummary> {
        self.wings
            .iter()
            .filter(|(_, w)| filter.map_or(true, |f| paths_overlap(f, &w.path)))
            .map(|(key, w)| WingSummary {
                key: key.clone(),
                id: w.id.clone(),
                path: w.path.clone(),
                parent: w.parent.clone(),
                specificity: w.specificity,
                atom_count: w.atoms.len(),
            })
            .collect()
    }

    pub fn stats_report(&self) -> StatsReport {
        let mut atoms_by_type = BTreeMap::new();
        for atom in self.atoms.iter() {
            *atoms_by_type.entry(atom.atom_type.to_string()).or_insert(0) += 1;
        }
        StatsReport {
            total_atoms: self.atoms.len() as u64,
            total_wings: self.wings.len() as u64,
            total_searches: self.stats.total_searches(),
            total_research: self.stats.total_research(),
            last_updated: self.stats.last_updated,
            atoms_by_type,
        }
    }

    /// Re-hash every atom and count shared hashes.
    ///
    /// Reports only; duplicates are legal and nothing is modified.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for atom in self.atoms.iter() {
            report.atoms_checked += 1;
            match digest::content_hash(&atom.wing_path, &atom.payload) {
                Ok(hash) if hash == atom.hash => {}
                _ => report.mismatched.push(atom.id.clone()),
            }
            *seen.entry(atom.hash.as_str()).or_insert(0) += 1;
        }

        for count in seen.values().filter(|&&c| c > 1) {
            report.duplicate_hashes += 1;
            report.duplicate_atoms += count - 1;
        }
        report
    }
}

fn new_atom_id() -> String {
    format!("atom_{}", Uuid::new_v4().simple())
}
