//! Error taxonomy for the wing store
//!
//! Library code returns [`StoreError`]; the MCP and CLI edges wrap it in
//! `anyhow` with context.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by store, search, research and persistence operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Empty path, or a path with a blank segment
    #[error("invalid wing path: {0}")]
    InvalidWingPath(String),

    /// Payload could not be converted to canonical JSON
    #[error("invalid payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// A caller-supplied argument was out of range or unrecognized
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No atom is registered under this ID
    #[error("atom not found: {0}")]
    AtomNotFound(String),

    /// Snapshot exists but could not be read or parsed
    #[error("failed to read snapshot {path:?}: {source}")]
    PersistenceRead {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Snapshot could not be written; in-memory state is already mutated
    #[error("failed to write snapshot {path:?}: {source}")]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store or result could not be rendered as JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A thread panicked while holding the store lock
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// True when the logical operation succeeded in memory but the flush failed.
    ///
    /// Callers should retry [`crate::WingEngine::flush`], not the operation.
    pub fn is_durability_failure(&self) -> bool {
        matches!(self, StoreError::PersistenceWrite { .. })
    }
}

/// Result alias for wing store operations
pub type Result<T> = std::result::Result<T, StoreError>;
