use once_cell::sync::Lazy;

use crate::errors::{Result, StoreError};
use crate::value::{Value, decode, encode};

/// The trailing metadata record (spec §3.4 / §4.3.4). Every field encodes
/// to a fixed width, which is what lets a reopen locate it by seeking
/// `fileSize - META_SIZE` instead of scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeMeta {
    pub version: u64,
    pub max_entries: u64,
    pub min_entries: u64,
    pub size: u64,
    pub root_pointer: Option<u64>,
    pub next_id: u64,
}

impl BTreeMeta {
    #[must_use]
    pub fn new(order: u64) -> Self {
        Self {
            version: 1,
            max_entries: order,
            min_entries: order.div_ceil(2).saturating_sub(1),
            size: 0,
            root_pointer: None,
            next_id: 1,
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::object([
            ("version".to_string(), Value::Int(self.version as i64)),
            ("maxEntries".to_string(), Value::Int(self.max_entries as i64)),
            ("minEntries".to_string(), Value::Int(self.min_entries as i64)),
            ("size".to_string(), Value::Int(self.size as i64)),
            ("nextId".to_string(), Value::Int(self.next_id as i64)),
            ("hasRoot".to_string(), Value::Bool(self.root_pointer.is_some())),
            ("rootPointer".to_string(), Value::Pointer(self.root_pointer.unwrap_or(0))),
        ])
    }

    /// # Errors
    /// Returns `StoreError::CorruptMetadata` if `bytes` does not decode to
    /// a well-formed metadata record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = decode(bytes).map_err(|_| StoreError::CorruptMetadata)?;
        let bad = || StoreError::CorruptMetadata;
        let version = value.get("version").and_then(Value::as_int).ok_or_else(bad)? as u64;
        let max_entries = value.get("maxEntries").and_then(Value::as_int).ok_or_else(bad)? as u64;
        let min_entries = value.get("minEntries").and_then(Value::as_int).ok_or_else(bad)? as u64;
        let size = value.get("size").and_then(Value::as_int).ok_or_else(bad)? as u64;
        let next_id = value.get("nextId").and_then(Value::as_int).ok_or_else(bad)? as u64;
        let has_root = value.get("hasRoot").and_then(Value::as_bool).ok_or_else(bad)?;
        let root_raw = value.get("rootPointer").and_then(Value::as_pointer).ok_or_else(bad)?;
        Ok(Self {
            version,
            max_entries,
            min_entries,
            size,
            root_pointer: has_root.then_some(root_raw),
            next_id,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(&self.to_value())
    }
}

/// The fixed encoded width of a `BTreeMeta` record. Field names and types
/// are frozen, so this is a true constant computed once from a reference
/// instance.
pub static META_SIZE: Lazy<u64> = Lazy::new(|| BTreeMeta::new(3).to_bytes().len() as u64);
