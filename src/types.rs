//! Core types for the wing store
//!
//! Field names serialize in camelCase so snapshots stay readable by the
//! other tools that share the `atomic_wings.json` file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreError;

/// Initial confidence for every new atom
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// A node in the topic taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wing {
    pub id: String,
    /// General to specific, e.g. `["coding", "elixir", "phoenix"]`
    pub path: Vec<String>,
    /// Atom IDs in insertion order
    #[serde(default)]
    pub atoms: Vec<String>,
    /// Key of the path minus its last segment. The parent wing may not exist.
    pub parent: Option<String>,
    pub specificity: f64,
}

/// Uninterpreted kind tag on an atom
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AtomType {
    #[default]
    Fact,
    Rule,
    Pattern,
    Memory,
    Code,
    /// Caller-supplied extension
    Other(String),
}

impl AtomType {
    pub fn as_str(&self) -> &str {
        match self {
            AtomType::Fact => "fact",
            AtomType::Rule => "rule",
            AtomType::Pattern => "pattern",
            AtomType::Memory => "memory",
            AtomType::Code => "code",
            AtomType::Other(s) => s,
        }
    }
}

impl From<String> for AtomType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "fact" => AtomType::Fact,
            "rule" => AtomType::Rule,
            "pattern" => AtomType::Pattern,
            "memory" => AtomType::Memory,
            "code" => AtomType::Code,
            _ => AtomType::Other(s),
        }
    }
}

impl From<&str> for AtomType {
    fn from(s: &str) -> Self {
        AtomType::from(s.to_string())
    }
}

impl From<AtomType> for String {
    fn from(t: AtomType) -> Self {
        match t {
            AtomType::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of knowledge stored under exactly one wing.
///
/// Only `access_count` changes after creation. It is atomic so searches can
/// bump it while holding a shared lock on the store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Atom {
    pub id: String,
    pub hash: String,
    #[serde(rename = "type", default)]
    pub atom_type: AtomType,
    pub payload: Value,
    pub wing_path: Vec<String>,
    pub wing_id: String,
    pub specificity_score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub nano_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    access_count: AtomicU64,
    /// Lowercased compact payload JSON, the haystack for text matching
    #[serde(skip)]
    pub(crate) search_text: String,
}

impl Atom {
    pub(crate) fn new(
        id: String,
        hash: String,
        atom_type: AtomType,
        payload: Value,
        wing: &Wing,
        nano_tags: Vec<String>,
    ) -> Self {
        let mut atom = Self {
            id,
            hash,
            atom_type,
            payload,
            wing_path: wing.path.clone(),
            wing_id: wing.id.clone(),
            specificity_score: wing.specificity,
            confidence: DEFAULT_CONFIDENCE,
            nano_tags,
            created_at: Utc::now(),
            access_count: AtomicU64::new(0),
            search_text: String::new(),
        };
        atom.refresh_search_text();
        atom
    }

    /// Number of searches that have returned this atom
    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    pub(crate) fn record_access(&self) {
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn refresh_search_text(&mut self) {
        self.search_text = self.payload.to_string().to_lowercase();
    }
}

impl Clone for Atom {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            hash: self.hash.clone(),
            atom_type: self.atom_type.clone(),
            payload: self.payload.clone(),
            wing_path: self.wing_path.clone(),
            wing_id: self.wing_id.clone(),
            specificity_score: self.specificity_score,
            confidence: self.confidence,
            nano_tags: self.nano_tags.clone(),
            created_at: self.created_at,
            access_count: AtomicU64::new(self.access_count()),
            search_text: self.search_text.clone(),
        }
    }
}

/// How much a deep research run compresses its insights
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsolidationLevel {
    /// Two truncated insights plus a statistics line
    #[default]
    Brief,
    /// Every insight payload, untruncated
    Detailed,
    /// Same output as `Detailed`
    Comprehensive,
}

impl FromStr for ConsolidationLevel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "brief" => Ok(ConsolidationLevel::Brief),
            "detailed" => Ok(ConsolidationLevel::Detailed),
            "comprehensive" => Ok(ConsolidationLevel::Comprehensive),
            other => Err(StoreError::InvalidArgument(format!(
                "unknown consolidation level '{}' (expected brief, detailed or comprehensive)",
                other
            ))),
        }
    }
}

/// Result of `store_atom`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAtom {
    pub atom_id: String,
}

/// One ranked search result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub atom_id: String,
    pub wing_path: Vec<String>,
    pub atom_data: Value,
    pub relevance: f64,
}

/// Summary produced by deep research
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResearchSummary {
    /// Exactly three lines
    Brief(Vec<String>),
    /// Insight payloads in ranked order
    Insights(Vec<Value>),
}

impl ResearchSummary {
    pub fn len(&self) -> usize {
        match self {
            ResearchSummary::Brief(lines) => lines.len(),
            ResearchSummary::Insights(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of `deep_research`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub topic: String,
    pub research_time_ms: u64,
    pub atoms_analyzed: usize,
    pub summary: ResearchSummary,
}

/// Flat view of a wing for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WingSummary {
    pub key: String,
    pub id: String,
    pub path: Vec<String>,
    pub parent: Option<String>,
    pub specificity: f64,
    pub atom_count: usize,
}

/// Result of re-hashing every atom
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub atoms_checked: usize,
    /// Atoms whose stored hash no longer matches their content
    pub mismatched: Vec<String>,
    /// Hashes shared by more than one atom
    pub duplicate_hashes: usize,
    /// Atoms beyond the first carrying a shared hash
    pub duplicate_atoms: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_type_round_trips_known_and_custom() {
        assert_eq!(AtomType::from("rule"), AtomType::Rule);
        assert_eq!(AtomType::from("insight"), AtomType::Other("insight".into()));
        assert_eq!(String::from(AtomType::Code), "code");
        assert_eq!(String::from(AtomType::Other("insight".into())), "insight");

        let json = serde_json::to_string(&AtomType::Pattern).unwrap();
        assert_eq!(json, "\"pattern\"");
    }

    #[test]
    fn test_consolidation_level_parsing() {
        assert_eq!("brief".parse::<ConsolidationLevel>().unwrap(), ConsolidationLevel::Brief);
        assert_eq!(
            "Comprehensive".parse::<ConsolidationLevel>().unwrap(),
            ConsolidationLevel::Comprehensive
        );
        assert!(matches!(
            "verbose".parse::<ConsolidationLevel>(),
            Err(StoreError::InvalidArgument(_))
        ));
        assert_eq!(ConsolidationLevel::default(), ConsolidationLevel::Brief);
    }

    #[test]
    fn test_atom_serializes_camel_case_and_skips_search_text() {
        let wing = Wing {
            id: "wing_semantic".into(),
            path: vec!["semantic".into()],
            atoms: vec![],
            parent: None,
            specificity: 0.1,
        };
        let atom = Atom::new(
            "atom_1".into(),
            "abc".into(),
            AtomType::Fact,
            serde_json::json!({"Topic": "Greeting"}),
            &wing,
            vec!["topic".into()],
        );
        atom.record_access();

        let value = serde_json::to_value(&atom).unwrap();
        assert_eq!(value["type"], "fact");
        assert_eq!(value["wingId"], "wing_semantic");
        assert_eq!(value["accessCount"], 1);
        assert_eq!(value["confidence"], DEFAULT_CONFIDENCE);
        assert!(value.get("searchText").is_none());
        assert_eq!(atom.search_text, "{\"topic\":\"greeting\"}");
    }

    #[test]
    fn test_brief_summary_serializes_as_plain_array() {
        let summary = ResearchSummary::Brief(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(serde_json::to_value(&summary).unwrap(), serde_json::json!(["a", "b", "c"]));
        assert_eq!(summary.len(), 3);
    }
}
