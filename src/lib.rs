//! wingstore - hierarchical knowledge store for AI agents
//!
//! Agents file JSON "atoms" under topic paths called wings
//! (`["coding", "elixir", "phoenix"]`), then pull them back with relevance
//! search or a bounded research pass that consolidates the best matches.
//! The whole store lives in one JSON snapshot that is rewritten atomically
//! after every mutation.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use wingstore::{Config, ConsolidationLevel, WingEngine};
//! use serde_json::json;
//!
//! let config = Config::from_env();
//! let engine = WingEngine::open_file(&config.snapshot_path())?;
//!
//! let path = vec!["coding".to_string(), "elixir".to_string()];
//! let stored = engine.store_atom(&path, &json!({"note": "use GenServer for state"}), None)?;
//!
//! let hits = engine.search_atoms("genserver", None, Some(10))?;
//! let report = engine.deep_research("supervision", None, ConsolidationLevel::Brief)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   AI Agent (Claude, etc.)            │
//! └─────────────────────┬───────────────────────────────┘
//!                       │ MCP over stdio
//!                       ▼
//! ┌─────────────────────────────────────────────────────┐
//! │  mcp       store_atom / search_atoms / deep_research │
//! │  engine    RwLock<KnowledgeStore> + flush-on-write   │
//! │  search    text 0.5 + tags 0.3 + specificity 0.2     │
//! │  research  bounded scan, insights > 0.7              │
//! │  store     wings, atoms, counters                    │
//! └─────────────────────┬───────────────────────────────┘
//!                       │ temp file + rename
//!                       ▼
//!                atomic_wings.json
//! ```

pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod persistence;
pub mod research;
pub mod search;
pub mod store;
pub mod types;
pub mod wing;

// Core types
pub use engine::WingEngine;
pub use error::{Result, StoreError};
pub use store::{KnowledgeStore, StatsReport, StoreStats};
pub use types::*;

// Persistence
pub use persistence::{JsonFileSnapshot, MemorySnapshot, SnapshotBackend};

// Search and research
pub use search::{SearchOptions, DEFAULT_SEARCH_LIMIT};
pub use research::DEFAULT_MAX_ATOMS;

pub use config::Config;
