//! Runtime configuration from environment variables
//!
//! | Variable | Default |
//! |---|---|
//! | `WINGSTORE_DATA_DIR` | platform data dir + `/wingstore` |
//! | `WINGSTORE_SNAPSHOT` | `atomic_wings.json` (relative to the data dir) |
//! | `WINGSTORE_LOG` | `wingstore=info` (`RUST_LOG` wins when set) |

use std::path::PathBuf;

pub const DEFAULT_SNAPSHOT_FILE: &str = "atomic_wings.json";
pub const DEFAULT_LOG_FILTER: &str = "wingstore=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub snapshot_file: PathBuf,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = non_empty("WINGSTORE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let snapshot_file = non_empty("WINGSTORE_SNAPSHOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_FILE));
        let log_filter = non_empty("WINGSTORE_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self {
            data_dir,
            snapshot_file,
            log_filter,
        }
    }

    /// Absolute snapshot file names are used as-is
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }
}

fn default_data_dir() -> PathBuf {
    // XDG data dir on Linux, ~/Library/Application Support on macOS
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wingstore")
}
