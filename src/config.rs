//! On-disk configuration, loaded from TOML via `serde` the way the
//! teacher configures its database defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StoreError};

/// Engine-wide tunables. Every index still accepts explicit parameters
/// at `open`; this is for embedding a single shared default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// B+Tree order (`N`, spec §4.3.1).
    pub btree_order: u64,
    /// R-Tree branching factor (spec §4.4.1).
    pub rtree_max_entries: u64,
    /// Bounded node-cache capacity. `BTree::open`/`RTree::open` read
    /// this from [`StoreConfig::default`]; pass an explicit capacity via
    /// `open_with_cache_capacity` to override it per tree.
    pub node_cache_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { btree_order: 64, rtree_max_entries: 9, node_cache_capacity: 256 }
    }
}

impl StoreConfig {
    /// Loads configuration from a TOML file, falling back to
    /// [`StoreConfig::default`] for any field the file omits.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the file cannot be read, or
    /// `StoreError::Malformed` if it is not valid TOML for this schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| StoreError::Malformed(0, e.to_string()))
    }
}
