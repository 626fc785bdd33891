//! Content digests and nano-tag extraction
//!
//! Pure functions over a payload's canonical JSON:
//! - SHA-256 over `(wing_path, payload)` for integrity checks
//! - up to 10 lowercase alphanumeric tokens as secondary search keys

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest as _, Sha256};

use crate::error::{Result, StoreError};

/// Maximum nano-tags kept per atom
pub const MAX_NANO_TAGS: usize = 10;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9]{3,}").expect("valid token regex"));

/// Hash and tags derived from one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    pub hash: String,
    pub tags: Vec<String>,
}

/// Convert any serializable payload to the opaque JSON value the store keeps.
pub fn canonical_payload<P: Serialize + ?Sized>(payload: &P) -> Result<Value> {
    serde_json::to_value(payload).map_err(StoreError::InvalidPayload)
}

/// Compute hash and nano-tags for a payload stored under `wing_path`.
pub fn extract(wing_path: &[String], payload: &Value) -> Result<ContentDigest> {
    Ok(ContentDigest {
        hash: content_hash(wing_path, payload)?,
        tags: nano_tags(payload),
    })
}

/// SHA-256 hex digest of `[wing_path, payload]` as compact JSON.
///
/// `serde_json` object maps are key-sorted, so equal payloads always hash equal.
pub fn content_hash(wing_path: &[String], payload: &Value) -> Result<String> {
    let bytes = serde_json::to_vec(&(wing_path, payload)).map_err(StoreError::InvalidPayload)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Distinct `[a-z0-9]{3,}` tokens of the lowercased payload text, first 10.
pub fn nano_tags(payload: &Value) -> Vec<String> {
    tags_from_text(&payload.to_string().to_lowercase())
}

fn tags_from_text(lowered: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(MAX_NANO_TAGS);
    for token in TOKEN_RE.find_iter(lowered) {
        let token = token.as_str();
        if tags.iter().any(|t| t == token) {
            continue;
        }
        tags.push(token.to_string());
        if tags.len() == MAX_NANO_TAGS {
            break;
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tags_lowercase_dedup_in_first_occurrence_order() {
        let tags = nano_tags(&json!({"note": "Use GenServer for state, use genserver"}));
        assert_eq!(tags, vec!["note", "use", "genserver", "for", "state"]);
    }

    #[test]
    fn test_tags_skip_short_tokens_and_cap_at_ten() {
        let payload = json!("a bb ccc dddd e1 f22 one two three four five six seven eight nine ten");
        let tags = nano_tags(&payload);
        assert_eq!(tags.len(), MAX_NANO_TAGS);
        assert_eq!(tags[0], "ccc");
        assert_eq!(tags[1], "dddd");
        assert_eq!(tags[2], "f22");
        assert!(!tags.contains(&"bb".to_string()));
        assert!(!tags.contains(&"ten".to_string()));
    }

    #[test]
    fn test_tags_include_object_keys_and_numbers() {
        let tags = nano_tags(&json!({"port": 4000, "ok": true}));
        assert_eq!(tags, vec!["true", "port", "4000"]);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = content_hash(&path(&["semantic"]), &json!({"topic": "greeting"})).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_ignores_key_order_but_not_path() {
        let a = json!({"x": 1, "y": 2});
        let b: Value = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();
        let wing = path(&["coding", "elixir"]);
        assert_eq!(content_hash(&wing, &a).unwrap(), content_hash(&wing, &b).unwrap());

        let other = path(&["elixir", "coding"]);
        assert_ne!(content_hash(&wing, &a).unwrap(), content_hash(&other, &a).unwrap());
    }

    #[test]
    fn test_canonical_payload_rejects_non_string_keys() {
        let mut bad: HashMap<(u8, u8), &str> = HashMap::new();
        bad.insert((1, 2), "x");
        assert!(matches!(canonical_payload(&bad), Err(StoreError::InvalidPayload(_))));

        let ok = canonical_payload(&json!({"note": "fine"})).unwrap();
        assert_eq!(ok["note"], "fine");
    }

    proptest! {
        /// Repeated extraction yields identical tags and hash.
        #[test]
        fn prop_extract_is_deterministic(text in ".{0,200}", n in any::<i64>()) {
            let payload = json!({"text": text, "n": n});
            let wing = vec!["agent".to_string(), "memories".to_string()];
            let first = extract(&wing, &payload).unwrap();
            let second = extract(&wing, &payload).unwrap();
            prop_assert_eq!(first, second);
        }

        /// Tags are bounded, distinct and well-formed.
        #[test]
        fn prop_tags_bounded_and_distinct(text in "[A-Za-z0-9 ,.]{0,300}") {
            let tags = nano_tags(&json!(text));
            prop_assert!(tags.len() <= MAX_NANO_TAGS);
            for (i, tag) in tags.iter().enumerate() {
                prop_assert!(tag.len() >= 3);
                prop_assert!(tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
                prop_assert!(!tags[..i].contains(tag));
            }
        }
    }
}
