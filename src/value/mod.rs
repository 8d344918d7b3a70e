//! The tagged-variant value model (component C1) — the ground-truth
//! serialization used by every higher layer in the engine.

mod codec;
mod object_id;

pub use codec::{ByteSource, decode, decode_at, encode, size_at};
pub use object_id::ObjectId;

use std::cmp::Ordering;

/// Smallest integer representable without loss as an IEEE-754 double,
/// i.e. `-(2^53) + 1`.
pub const SAFE_INT_MIN: i64 = -(1i64 << 53) + 1;
/// Largest integer representable without loss as an IEEE-754 double,
/// i.e. `2^53 - 1`.
pub const SAFE_INT_MAX: i64 = (1i64 << 53) - 1;

pub(crate) mod tag {
    pub const NULL: u8 = 0x00;
    pub const FALSE: u8 = 0x01;
    pub const TRUE: u8 = 0x02;
    pub const INT: u8 = 0x03;
    pub const FLOAT: u8 = 0x04;
    pub const STRING: u8 = 0x05;
    pub const OBJECT_ID: u8 = 0x06;
    pub const DATE: u8 = 0x07;
    pub const POINTER: u8 = 0x08;
    pub const BINARY: u8 = 0x09;
    pub const TIMESTAMP: u8 = 0x0A;
    pub const ARRAY: u8 = 0x10;
    pub const OBJECT: u8 = 0x11;
}

/// A tagged-variant value: the single datum type every record in the
/// engine is built from.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// A signed integer; always within `[SAFE_INT_MIN, SAFE_INT_MAX]`.
    Int(i64),
    Float(f64),
    Str(String),
    ObjectId(ObjectId),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    /// A byte offset into a `BlockFile`; always non-negative and within
    /// the safe-integer range.
    Pointer(u64),
    Binary(Vec<u8>),
    /// Seconds since the epoch plus a monotonic ordinal within that second.
    Timestamp { secs: u32, ordinal: u32 },
    Array(Vec<Value>),
    /// Key-value pairs in insertion order. Construct via [`Value::object`]
    /// to get last-write-wins de-duplication; the codec never emits a
    /// duplicate key itself.
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Builds an `Object` value from an iterator of pairs, applying
    /// last-write-wins semantics: if a key repeats, the later value wins
    /// but the key keeps its first position.
    #[must_use]
    pub fn object<I: IntoIterator<Item = (String, Value)>>(pairs: I) -> Self {
        let mut out: Vec<(String, Value)> = Vec::new();
        for (k, v) in pairs {
            if let Some(slot) = out.iter_mut().find(|(ek, _)| *ek == k) {
                slot.1 = v;
            } else {
                out.push((k, v));
            }
        }
        Value::Object(out)
    }

    #[must_use]
    pub fn get<'a>(&'a self, key: &str) -> Option<&'a Value> {
        match self {
            Value::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_pointer(&self) -> Option<u64> {
        match self {
            Value::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Null => tag::NULL,
            Value::Bool(false) => tag::FALSE,
            Value::Bool(true) => tag::TRUE,
            Value::Int(_) => tag::INT,
            Value::Float(_) => tag::FLOAT,
            Value::Str(_) => tag::STRING,
            Value::ObjectId(_) => tag::OBJECT_ID,
            Value::Date(_) => tag::DATE,
            Value::Pointer(_) => tag::POINTER,
            Value::Binary(_) => tag::BINARY,
            Value::Timestamp { .. } => tag::TIMESTAMP,
            Value::Array(_) => tag::ARRAY,
            Value::Object(_) => tag::OBJECT,
        }
    }
}

/// Orders two key values. `Int`/`Float` compare numerically, `String`
/// compares lexicographically. Comparing across variants is unspecified
/// by the format but must still be a deterministic total order so that
/// tree invariants never panic; we fall back to comparing tag bytes.
#[must_use]
pub fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::ObjectId(x), Value::ObjectId(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        _ => a.tag().cmp(&b.tag()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_dedupes_last_write_wins() {
        let v = Value::object([
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::Int(3)),
        ]);
        match v {
            Value::Object(pairs) => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[0], ("a".to_string(), Value::Int(3)));
                assert_eq!(pairs[1], ("b".to_string(), Value::Int(2)));
            }
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn compare_keys_orders_strings_lexicographically() {
        assert_eq!(compare_keys(&Value::Str("a".into()), &Value::Str("b".into())), Ordering::Less);
    }
}
