use super::geo::BBox;
use crate::errors::{Result, StoreError};
use crate::value::{ObjectId, Value};

/// A leaf entry: a point plus the opaque identifier it was inserted
/// under. Its bounding box is the degenerate point box `BBox::point`.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafEntry {
    pub lat: f64,
    pub lng: f64,
    pub object_id: ObjectId,
}

impl LeafEntry {
    #[must_use]
    pub fn bbox(&self) -> BBox {
        BBox::point(self.lat, self.lng)
    }
}

/// An R-Tree node (spec §4.4.1): a leaf of point entries, or an internal
/// node of child pointers. Every node carries its own enclosing `bbox`.
#[derive(Debug, Clone)]
pub enum RNode {
    Leaf { id: u64, bbox: Option<BBox>, entries: Vec<LeafEntry> },
    Internal { id: u64, bbox: Option<BBox>, children: Vec<u64> },
}

impl RNode {
    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            RNode::Leaf { bbox, .. } | RNode::Internal { bbox, .. } => *bbox,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RNode::Leaf { entries, .. } => entries.len(),
            RNode::Internal { children, .. } => children.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            RNode::Leaf { id, bbox, entries } => Value::object([
                ("id".to_string(), Value::Int(*id as i64)),
                ("isLeaf".to_string(), Value::Bool(true)),
                ("bbox".to_string(), bbox.map_or(Value::Null, BBox::to_value)),
                (
                    "entries".to_string(),
                    Value::Array(
                        entries
                            .iter()
                            .map(|e| {
                                Value::object([
                                    ("lat".to_string(), Value::Float(e.lat)),
                                    ("lng".to_string(), Value::Float(e.lng)),
                                    ("objectId".to_string(), Value::ObjectId(e.object_id)),
                                ])
                            })
                            .collect(),
                    ),
                ),
                ("children".to_string(), Value::Array(Vec::new())),
            ]),
            RNode::Internal { id, bbox, children } => Value::object([
                ("id".to_string(), Value::Int(*id as i64)),
                ("isLeaf".to_string(), Value::Bool(false)),
                ("bbox".to_string(), bbox.map_or(Value::Null, BBox::to_value)),
                ("entries".to_string(), Value::Array(Vec::new())),
                (
                    "children".to_string(),
                    Value::Array(children.iter().map(|c| Value::Pointer(*c)).collect()),
                ),
            ]),
        }
    }

    /// # Errors
    /// Returns `StoreError::Malformed`-class errors if the value's shape
    /// does not match an R-Tree node record.
    pub fn from_value(value: &Value) -> Result<Self> {
        let bad = || StoreError::Malformed(0, "not an r-tree node".into());
        let id = value.get("id").and_then(Value::as_int).ok_or_else(bad)? as u64;
        let is_leaf = value.get("isLeaf").and_then(Value::as_bool).ok_or_else(bad)?;
        let bbox = match value.get("bbox") {
            Some(Value::Null) | None => None,
            Some(v) => Some(BBox::from_value(v)?),
        };
        if is_leaf {
            let raw = value.get("entries").and_then(Value::as_array).ok_or_else(bad)?;
            let entries = raw
                .iter()
                .map(|e| {
                    let lat = e.get("lat").and_then(|v| if let Value::Float(f) = v { Some(*f) } else { None }).ok_or_else(bad)?;
                    let lng = e.get("lng").and_then(|v| if let Value::Float(f) = v { Some(*f) } else { None }).ok_or_else(bad)?;
                    let object_id = match e.get("objectId") {
                        Some(Value::ObjectId(oid)) => *oid,
                        _ => return Err(bad()),
                    };
                    Ok(LeafEntry { lat, lng, object_id })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(RNode::Leaf { id, bbox, entries })
        } else {
            let raw = value.get("children").and_then(Value::as_array).ok_or_else(bad)?;
            let children = raw.iter().map(|v| v.as_pointer().ok_or_else(bad)).collect::<Result<Vec<_>>>()?;
            Ok(RNode::Internal { id, bbox, children })
        }
    }
}
