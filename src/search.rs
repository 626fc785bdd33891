//! Relevance search over the atom table
//!
//! Scoring per atom:
//! - 0.5 if the lowercased payload JSON contains the lowercased query
//! - 0.3 if any nano-tag contains it
//! - 0.2 x the atom's specificity, always
//!
//! The sum is scaled by confidence. Each atom scores independently, so the
//! scan holds only a shared borrow of the store.

use std::time::Instant;
use tracing::debug;

use crate::store::KnowledgeStore;
use crate::types::{Atom, SearchHit};
use crate::wing::paths_overlap;

pub const TEXT_MATCH_WEIGHT: f64 = 0.5;
pub const TAG_MATCH_WEIGHT: f64 = 0.3;
pub const SPECIFICITY_WEIGHT: f64 = 0.2;
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Filters and bounds for one search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Atom passes if any filter overlaps its wing path. Empty means all atoms.
    pub wing_filters: Vec<Vec<String>>,
    /// Maximum hits returned
    pub limit: usize,
    /// Maximum eligible atoms scored, oldest first. `None` scans everything.
    pub scan_limit: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            wing_filters: Vec::new(),
            limit: DEFAULT_SEARCH_LIMIT,
            scan_limit: None,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// An atom with its relevance for one query
#[derive(Debug, Clone, Copy)]
pub struct ScoredAtom<'a> {
    pub atom: &'a Atom,
    pub relevance: f64,
}

impl ScoredAtom<'_> {
    pub fn to_hit(&self) -> SearchHit {
        SearchHit {
            atom_id: self.atom.id.clone(),
            wing_path: self.atom.wing_path.clone(),
            atom_data: self.atom.payload.clone(),
            relevance: self.relevance,
        }
    }
}

/// Ranked hits plus how many atoms were actually scored
#[derive(Debug)]
pub struct SearchOutcome<'a> {
    pub hits: Vec<ScoredAtom<'a>>,
    pub atoms_scored: usize,
}

pub fn matches_filters(atom: &Atom, filters: &[Vec<String>]) -> bool {
    filters.is_empty() || filters.iter().any(|f| paths_overlap(f, &atom.wing_path))
}

/// Relevance of `atom` for an already-lowercased query.
pub fn score(atom: &Atom, query_lower: &str) -> f64 {
    let mut total = 0.0;
    if atom.search_text.contains(query_lower) {
        total += TEXT_MATCH_WEIGHT;
    }
    if atom.nano_tags.iter().any(|tag| tag.contains(query_lower)) {
        total += TAG_MATCH_WEIGHT;
    }
    total += atom.specificity_score * SPECIFICITY_WEIGHT;
    total * atom.confidence
}

/// Score, rank and truncate. Bumps the access count of every returned atom.
///
/// Ties keep insertion order. An empty query matches every payload.
pub fn execute<'a>(store: &'a KnowledgeStore, query: &str, options: &SearchOptions) -> SearchOutcome<'a> {
    let started = Instant::now();
    let query_lower = query.to_lowercase();
    let scan_limit = options.scan_limit.unwrap_or(usize::MAX);

    let mut atoms_scored = 0;
    let mut hits: Vec<ScoredAtom<'a>> = store
        .atoms()
        .iter()
        .filter(|atom| matches_filters(atom, &options.wing_filters))
        .take(scan_limit)
        .filter_map(|atom| {
            atoms_scored += 1;
            let relevance = score(atom, &query_lower);
            (relevance > 0.0).then_some(ScoredAtom { atom, relevance })
        })
        .collect();

    hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    hits.truncate(options.limit);

    for hit in &hits {
        hit.atom.record_access();
    }
    store.record_search();

    debug!(
        query = %query,
        scored = atoms_scored,
        returned = hits.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Search complete"
    );

    SearchOutcome { hits, atoms_scored }
}

/// Search and return owned hits.
pub fn search(store: &KnowledgeStore, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
    execute(store, query, options)
        .hits
        .iter()
        .map(ScoredAtom::to_hit)
        .collect()
}
