use crate::errors::{Result, StoreError};
use crate::value::Value;

/// A B+Tree node (spec §3.4): a leaf holding `(key, value)` pairs and a
/// pointer to the next leaf for range scans, or an internal node holding
/// separator keys and child pointers.
#[derive(Debug, Clone)]
pub enum Node {
    Leaf { id: u64, keys: Vec<Value>, values: Vec<Value>, next: Option<u64> },
    Internal { id: u64, keys: Vec<Value>, children: Vec<u64> },
}

impl Node {
    #[must_use]
    pub fn keys(&self) -> &[Value] {
        match self {
            Node::Leaf { keys, .. } | Node::Internal { keys, .. } => keys,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Node::Leaf { id, keys, values, next } => Value::object([
                ("id".to_string(), Value::Int(*id as i64)),
                ("isLeaf".to_string(), Value::Bool(true)),
                ("keys".to_string(), Value::Array(keys.clone())),
                ("values".to_string(), Value::Array(values.clone())),
                ("children".to_string(), Value::Array(Vec::new())),
                ("next".to_string(), next.map_or(Value::Null, Value::Pointer)),
            ]),
            Node::Internal { id, keys, children } => Value::object([
                ("id".to_string(), Value::Int(*id as i64)),
                ("isLeaf".to_string(), Value::Bool(false)),
                ("keys".to_string(), Value::Array(keys.clone())),
                ("values".to_string(), Value::Array(Vec::new())),
                (
                    "children".to_string(),
                    Value::Array(children.iter().map(|c| Value::Pointer(*c)).collect()),
                ),
                ("next".to_string(), Value::Null),
            ]),
        }
    }

    /// # Errors
    /// Returns `StoreError::Malformed`-class errors if the value's shape
    /// does not match a node record.
    pub fn from_value(value: &Value) -> Result<Self> {
        let bad = || StoreError::Malformed(0, "not a b+tree node".into());
        let id = value.get("id").and_then(Value::as_int).ok_or_else(bad)? as u64;
        let is_leaf = value.get("isLeaf").and_then(Value::as_bool).ok_or_else(bad)?;
        let keys = value.get("keys").and_then(Value::as_array).ok_or_else(bad)?.to_vec();
        if is_leaf {
            let values = value.get("values").and_then(Value::as_array).ok_or_else(bad)?.to_vec();
            let next = match value.get("next") {
                Some(Value::Null) | None => None,
                Some(Value::Pointer(p)) => Some(*p),
                _ => return Err(bad()),
            };
            Ok(Node::Leaf { id, keys, values, next })
        } else {
            let children_raw = value.get("children").and_then(Value::as_array).ok_or_else(bad)?;
            let children = children_raw
                .iter()
                .map(|v| v.as_pointer().ok_or_else(bad))
                .collect::<Result<Vec<_>>>()?;
            Ok(Node::Internal { id, keys, children })
        }
    }
}
