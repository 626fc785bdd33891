//! Wing taxonomy
//!
//! A wing is identified by its path. Parent/child relations are structural:
//! the parent key is the path minus its last segment. Only the exact wing a
//! store call names is ever created; ancestors are not filled in.

use crate::error::{Result, StoreError};
use crate::types::Wing;

/// Joins path segments into a wing key
pub const KEY_SEPARATOR: &str = "_";

/// Specificity gained per path segment
pub const SPECIFICITY_PER_SEGMENT: f64 = 0.1;

/// Taxonomy seeded into a brand new store
pub const DEFAULT_TAXONOMY: &[&[&str]] = &[
    &["coding"],
    &["coding", "elixir"],
    &["coding", "elixir", "phoenix"],
    &["semantic"],
    &["brain", "contexts"],
    &["agent", "memories"],
    &["task", "executions"],
];

/// Reject empty paths and blank segments.
pub fn validate_path(path: &[String]) -> Result<()> {
    if path.is_empty() {
        return Err(StoreError::InvalidWingPath("path is empty".into()));
    }
    if let Some(pos) = path.iter().position(|s| s.trim().is_empty()) {
        return Err(StoreError::InvalidWingPath(format!(
            "segment {} of {:?} is blank",
            pos, path
        )));
    }
    Ok(())
}

/// Map key for a path, e.g. `coding_elixir`
pub fn wing_key(path: &[String]) -> String {
    path.join(KEY_SEPARATOR)
}

/// Public ID for a path, e.g. `wing_coding_elixir`
pub fn wing_id(path: &[String]) -> String {
    format!("wing_{}", wing_key(path))
}

/// Key of the enclosing path, `None` at the top level
pub fn parent_key(path: &[String]) -> Option<String> {
    if path.len() > 1 {
        Some(wing_key(&path[..path.len() - 1]))
    } else {
        None
    }
}

pub fn specificity(path: &[String]) -> f64 {
    path.len() as f64 * SPECIFICITY_PER_SEGMENT
}

/// True when either path is a prefix of the other (equal paths included).
pub fn paths_overlap(filter: &[String], path: &[String]) -> bool {
    let n = filter.len().min(path.len());
    filter[..n] == path[..n]
}

impl Wing {
    /// Build an empty wing for a validated path.
    pub fn new(path: Vec<String>) -> Result<Self> {
        validate_path(&path)?;
        Ok(Self {
            id: wing_id(&path),
            parent: parent_key(&path),
            specificity: specificity(&path),
            atoms: Vec::new(),
            path,
        })
    }

    pub fn key(&self) -> String {
        wing_key(&self.path)
    }
}

/// Owned path from string slices
pub fn to_path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wing_derives_id_parent_and_specificity() {
        let wing = Wing::new(to_path(&["coding", "elixir", "phoenix"])).unwrap();
        assert_eq!(wing.id, "wing_coding_elixir_phoenix");
        assert_eq!(wing.key(), "coding_elixir_phoenix");
        assert_eq!(wing.parent.as_deref(), Some("coding_elixir"));
        assert!((wing.specificity - 0.3).abs() < 1e-9);
        assert!(wing.atoms.is_empty());
    }

    #[test]
    fn test_top_level_wing_has_no_parent() {
        let wing = Wing::new(to_path(&["semantic"])).unwrap();
        assert_eq!(wing.parent, None);
        assert!((wing.specificity - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_paths_rejected() {
        assert!(matches!(Wing::new(vec![]), Err(StoreError::InvalidWingPath(_))));
        assert!(matches!(
            Wing::new(to_path(&["coding", "  "])),
            Err(StoreError::InvalidWingPath(_))
        ));
        assert!(matches!(
            validate_path(&to_path(&["", "x"])),
            Err(StoreError::InvalidWingPath(_))
        ));
    }

    #[test]
    fn test_paths_overlap_is_bidirectional_prefix() {
        let coding = to_path(&["coding"]);
        let elixir = to_path(&["coding", "elixir"]);
        let semantic = to_path(&["semantic"]);

        assert!(paths_overlap(&coding, &elixir));
        assert!(paths_overlap(&elixir, &coding));
        assert!(paths_overlap(&elixir, &elixir));
        assert!(!paths_overlap(&coding, &semantic));
        assert!(!paths_overlap(&to_path(&["coding", "rust"]), &elixir));
    }

    #[test]
    fn test_default_taxonomy_keys() {
        let keys: Vec<String> = DEFAULT_TAXONOMY.iter().map(|p| wing_key(&to_path(p))).collect();
        assert!(keys.contains(&"coding_elixir_phoenix".to_string()));
        assert!(keys.contains(&"brain_contexts".to_string()));
        assert_eq!(keys.len(), 7);
    }
}
