//! The compaction protocol shared by every index (component C6): rewrite
//! the live graph of a source index densely into a fresh `BlockFile`.

use std::path::{Path, PathBuf};

/// Outcome of a single `compact` call.
#[derive(Debug, Clone)]
pub struct CompactionReport {
    old_size: u64,
    new_size: u64,
    new_path: PathBuf,
}

impl CompactionReport {
    #[must_use]
    pub fn new(old_size: u64, new_size: u64, new_path: PathBuf) -> Self {
        Self { old_size, new_size, new_path }
    }

    #[must_use]
    pub fn old_size(&self) -> u64 {
        self.old_size
    }

    #[must_use]
    pub fn new_size(&self) -> u64 {
        self.new_size
    }

    #[must_use]
    pub fn bytes_saved(&self) -> u64 {
        self.old_size.saturating_sub(self.new_size)
    }

    #[must_use]
    pub fn new_path(&self) -> &Path {
        &self.new_path
    }
}
