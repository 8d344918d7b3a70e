#![forbid(unsafe_code)]

//! An embedded, append-only storage engine providing three persistent
//! indexes — a B+Tree, an R-Tree, and a stemmed inverted text index —
//! over a single self-describing tagged-variant binary record format.
//!
//! Every mutation is persisted by appending new node images; nothing is
//! ever overwritten in place. A reopen locates the current root by
//! reading the trailing fixed-width metadata record.

pub mod blockfile;
pub mod btree;
pub mod cli;
pub mod compaction;
pub mod config;
pub mod errors;
pub mod logger;
pub mod rtree;
pub mod textindex;
pub mod value;

pub use blockfile::{BlockFile, Mode};
pub use btree::BTree;
pub use compaction::CompactionReport;
pub use config::StoreConfig;
pub use errors::{Result, StoreError};
pub use rtree::RTree;
pub use textindex::TextIndex;
pub use value::{ObjectId, Value};
