//! Directory service configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the directory service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirServiceConfig {
    /// Zstd level used by the `Zstd` packing.
    pub zstd_level: i32,
    /// Deepest path, in elements below the root, that any operation accepts.
    pub max_path_elements: usize,
    /// Initial capacity of the glob engine's candidate sets, capped at 1024.
    pub glob_capacity: usize,
}

impl Default for DirServiceConfig {
    fn default() -> Self {
        Self {
            zstd_level: cowtree_pack::packing::DEFAULT_ZSTD_LEVEL,
            max_path_elements: 256,
            glob_capacity: 100,
        }
    }
}

impl DirServiceConfig {
    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json(doc: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(doc)
    }
}
