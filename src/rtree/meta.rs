use once_cell::sync::Lazy;

use crate::errors::{Result, StoreError};
use crate::value::{Value, decode, encode};

/// Trailing metadata record for an R-Tree file, placed and sized exactly
/// as `BTreeMeta` (spec §4.4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RTreeMeta {
    pub version: u64,
    pub max_entries: u64,
    pub min_entries: u64,
    pub size: u64,
    pub root_pointer: Option<u64>,
    pub next_id: u64,
}

impl RTreeMeta {
    #[must_use]
    pub fn new(max_entries: u64) -> Self {
        Self {
            version: 1,
            max_entries,
            min_entries: (max_entries.div_ceil(2)).max(2),
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
    /// Returns `StoreError::CorruptMetadata` if `bytes` is not a
    /// well-formed metadata record.
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
        Ok(Self { version, max_entries, min_entries, size, root_pointer: has_root.then_some(root_raw), next_id })
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(&self.to_value())
    }
}

pub static META_SIZE: Lazy<u64> = Lazy::new(|| RTreeMeta::new(9).to_bytes().len() as u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_size_is_stable_across_values() {
        let a = RTreeMeta::new(9).to_bytes().len();
        let mut m = RTreeMeta::new(200);
        m.size = 999_999;
        m.root_pointer = Some(123_456_789);
        let b = m.to_bytes().len();
        assert_eq!(a, b);
        assert_eq!(*META_SIZE as usize, a);
    }

    #[test]
    fn round_trips() {
        let mut m = RTreeMeta::new(9);
        m.root_pointer = Some(42);
        m.size = 7;
        let back = RTreeMeta::from_bytes(&m.to_bytes()).unwrap();
        assert_eq!(m, back);
    }
}
