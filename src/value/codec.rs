//! Encode/decode for the record format of spec §3.1, plus `size_at`, which
//! computes a value's on-disk length from at most two reads (the tag byte
//! and, for length-prefixed variants, the following 4-byte length word).

use super::{ObjectId, SAFE_INT_MAX, SAFE_INT_MIN, Value, tag};
use crate::errors::{Result, StoreError};

/// A random-access byte source a value can be sized from without decoding
/// its full payload. `BlockFile` implements this directly; `&[u8]` is
/// provided for tests and in-memory use.
pub trait ByteSource {
    /// # Errors
    /// Returns an error if the underlying medium cannot be read.
    fn read_at(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>>;
}

impl ByteSource for [u8] {
    fn read_at(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let start = offset as usize;
        let end = (start + len).min(self.len());
        if start > self.len() {
            return Ok(Vec::new());
        }
        Ok(self[start..end].to_vec())
    }
}

impl ByteSource for Vec<u8> {
    fn read_at(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        self.as_slice().read_at(offset, len)
    }
}

/// Serializes `value` per spec §3.1.
#[must_use]
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(tag::NULL),
        Value::Bool(false) => out.push(tag::FALSE),
        Value::Bool(true) => out.push(tag::TRUE),
        Value::Int(i) => {
            out.push(tag::INT);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            out.push(tag::FLOAT);
            out.extend_from_slice(&f.to_le_bytes());
        }
        Value::Str(s) => {
            out.push(tag::STRING);
            let bytes = s.as_bytes();
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
        Value::ObjectId(id) => {
            out.push(tag::OBJECT_ID);
            out.extend_from_slice(id.as_bytes());
        }
        Value::Date(ms) => {
            out.push(tag::DATE);
            out.extend_from_slice(&ms.to_le_bytes());
        }
        Value::Pointer(p) => {
            out.push(tag::POINTER);
            out.extend_from_slice(&p.to_le_bytes());
        }
        Value::Binary(bytes) => {
            out.push(tag::BINARY);
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
        Value::Timestamp { secs, ordinal } => {
            out.push(tag::TIMESTAMP);
            let combined = (u64::from(*secs) << 32) | u64::from(*ordinal);
            out.extend_from_slice(&combined.to_le_bytes());
        }
        Value::Array(items) => {
            out.push(tag::ARRAY);
            let mut content = Vec::new();
            content.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_into(item, &mut content);
            }
            out.extend_from_slice(&(content.len() as u32).to_le_bytes());
            out.extend_from_slice(&content);
        }
        Value::Object(pairs) => {
            out.push(tag::OBJECT);
            let mut content = Vec::new();
            content.extend_from_slice(&(pairs.len() as u32).to_le_bytes());
            for (k, v) in pairs {
                let kb = k.as_bytes();
                content.extend_from_slice(&(kb.len() as u32).to_le_bytes());
                content.extend_from_slice(kb);
                encode_into(v, &mut content);
            }
            out.extend_from_slice(&(content.len() as u32).to_le_bytes());
            out.extend_from_slice(&content);
        }
    }
}

/// Decodes a single top-level value starting at offset 0 of `bytes`,
/// ignoring any trailing bytes.
///
/// # Errors
/// Returns `StoreError` variants on any inconsistency between the tag,
/// declared lengths, and the buffer contents.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    decode_at(bytes, 0).map(|(v, _)| v)
}

/// Decodes a value starting at `offset` and returns it along with the
/// number of bytes consumed.
///
/// # Errors
/// See [`decode`].
pub fn decode_at(bytes: &[u8], offset: usize) -> Result<(Value, usize)> {
    let t = *bytes.get(offset).ok_or(StoreError::UnexpectedEof)?;
    let body = offset + 1;
    match t {
        tag::NULL => Ok((Value::Null, 1)),
        tag::FALSE => Ok((Value::Bool(false), 1)),
        tag::TRUE => Ok((Value::Bool(true), 1)),
        tag::INT => {
            let raw = read_i64(bytes, body)?;
            if !(SAFE_INT_MIN..=SAFE_INT_MAX).contains(&raw) {
                return Err(StoreError::IntegerOutOfSafeRange);
            }
            Ok((Value::Int(raw), 9))
        }
        tag::FLOAT => {
            let raw = read_u64(bytes, body)?;
            Ok((Value::Float(f64::from_bits(raw)), 9))
        }
        tag::STRING => {
            let len = read_u32(bytes, body)? as usize;
            let data = slice(bytes, body + 4, len)?;
            let s = String::from_utf8(data.to_vec()).map_err(|_| StoreError::NonUtf8)?;
            Ok((Value::Str(s), 1 + 4 + len))
        }
        tag::OBJECT_ID => {
            let data = slice(bytes, body, 12)?;
            let arr: [u8; 12] = data.try_into().expect("slice length checked above");
            Ok((Value::ObjectId(ObjectId::from_bytes(arr)), 13))
        }
        tag::DATE => {
            let raw = read_i64(bytes, body)?;
            Ok((Value::Date(raw), 9))
        }
        tag::POINTER => {
            let raw = read_u64(bytes, body)?;
            if raw > (SAFE_INT_MAX as u64) {
                return Err(StoreError::PointerOutOfSafeRange);
            }
            Ok((Value::Pointer(raw), 9))
        }
        tag::BINARY => {
            let len = read_u32(bytes, body)? as usize;
            let data = slice(bytes, body + 4, len)?;
            Ok((Value::Binary(data.to_vec()), 1 + 4 + len))
        }
        tag::TIMESTAMP => {
            let raw = read_u64(bytes, body)?;
            let secs = (raw >> 32) as u32;
            let ordinal = raw as u32;
            Ok((Value::Timestamp { secs, ordinal }, 9))
        }
        tag::ARRAY => {
            let content_size = read_u32(bytes, body)? as usize;
            let content = slice(bytes, body + 4, content_size)?;
            let count = read_u32(content, 0)? as usize;
            let mut items = Vec::with_capacity(count);
            let mut pos = 4;
            for _ in 0..count {
                let (item, used) = decode_at(content, pos)?;
                items.push(item);
                pos += used;
            }
            Ok((Value::Array(items), 1 + 4 + content_size))
        }
        tag::OBJECT => {
            let content_size = read_u32(bytes, body)? as usize;
            let content = slice(bytes, body + 4, content_size)?;
            let count = read_u32(content, 0)? as usize;
            let mut pairs: Vec<(String, Value)> = Vec::with_capacity(count);
            let mut pos = 4;
            for _ in 0..count {
                let klen = read_u32(content, pos)? as usize;
                let kbytes = slice(content, pos + 4, klen)?;
                let key = String::from_utf8(kbytes.to_vec()).map_err(|_| StoreError::NonUtf8)?;
                pos += 4 + klen;
                let (val, used) = decode_at(content, pos)?;
                pos += used;
                if let Some(slot) = pairs.iter_mut().find(|(ek, _)| *ek == key) {
                    slot.1 = val;
                } else {
                    pairs.push((key, val));
                }
            }
            Ok((Value::Object(pairs), 1 + 4 + content_size))
        }
        other => Err(StoreError::UnknownTag(other)),
    }
}

/// Computes the byte length of the value at `offset` using at most two
/// reads from `reader`: the tag byte, and — for `String`/`Binary`/`Array`/
/// `Object` — the following 4-byte length word.
///
/// # Errors
/// Returns an error if the underlying read fails or the tag is unknown.
pub fn size_at<R: ByteSource + ?Sized>(reader: &R, offset: u64) -> Result<u64> {
    let head = reader.read_at(offset, 1)?;
    let t = *head.first().ok_or(StoreError::UnexpectedEof)?;
    let size = match t {
        tag::NULL | tag::FALSE | tag::TRUE => 1,
        tag::INT | tag::FLOAT | tag::DATE | tag::POINTER | tag::TIMESTAMP => 9,
        tag::OBJECT_ID => 13,
        tag::STRING | tag::BINARY | tag::ARRAY | tag::OBJECT => {
            let len_bytes = reader.read_at(offset + 1, 4)?;
            if len_bytes.len() < 4 {
                return Err(StoreError::UnexpectedEof);
            }
            let len = u32::from_le_bytes(len_bytes.try_into().expect("checked len above"));
            1 + 4 + u64::from(len)
        }
        other => return Err(StoreError::UnknownTag(other)),
    };
    Ok(size)
}

fn slice(bytes: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    let end = start.checked_add(len).ok_or(StoreError::InvalidLength)?;
    bytes.get(start..end).ok_or(StoreError::UnexpectedEof)
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    let raw = slice(bytes, at, 4)?;
    Ok(u32::from_le_bytes(raw.try_into().expect("slice length checked above")))
}

fn read_i64(bytes: &[u8], at: usize) -> Result<i64> {
    let raw = slice(bytes, at, 8)?;
    Ok(i64::from_le_bytes(raw.try_into().expect("slice length checked above")))
}

fn read_u64(bytes: &[u8], at: usize) -> Result<u64> {
    let raw = slice(bytes, at, 8)?;
    Ok(u64::from_le_bytes(raw.try_into().expect("slice length checked above")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) {
        let bytes = encode(&v);
        assert_eq!(size_at(&bytes, 0).unwrap(), bytes.len() as u64);
        let back = decode(&bytes).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn scalars_round_trip() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
        roundtrip(Value::Int(-42));
        roundtrip(Value::Int(SAFE_INT_MAX));
        roundtrip(Value::Int(SAFE_INT_MIN));
        roundtrip(Value::Float(3.5));
        roundtrip(Value::Str("hello world".into()));
        roundtrip(Value::ObjectId(ObjectId::new()));
        roundtrip(Value::Date(1_700_000_000_000));
        roundtrip(Value::Pointer(12345));
        roundtrip(Value::Binary(vec![1, 2, 3, 4]));
        roundtrip(Value::Timestamp { secs: 10, ordinal: 2 });
    }

    #[test]
    fn composites_round_trip() {
        roundtrip(Value::Array(vec![Value::Int(1), Value::Str("a".into()), Value::Null]));
        roundtrip(Value::object([
            ("x".to_string(), Value::Int(1)),
            ("y".to_string(), Value::Str("z".into())),
        ]));
    }

    #[test]
    fn nested_composites_round_trip() {
        let v = Value::object([(
            "items".to_string(),
            Value::Array(vec![Value::object([("a".to_string(), Value::Int(1))])]),
        )]);
        roundtrip(v);
    }

    #[test]
    fn rejects_out_of_range_integer() {
        let mut bytes = vec![tag::INT];
        bytes.extend_from_slice(&(SAFE_INT_MAX + 1).to_le_bytes());
        assert!(matches!(decode(&bytes), Err(StoreError::IntegerOutOfSafeRange)));
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!(matches!(decode(&[0xFF]), Err(StoreError::UnknownTag(0xFF))));
    }

    #[test]
    fn rejects_non_utf8_string() {
        let mut bytes = vec![tag::STRING];
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        assert!(matches!(decode(&bytes), Err(StoreError::NonUtf8)));
    }

    #[test]
    fn size_at_skips_composite_without_decoding() {
        let v = Value::Array(vec![Value::Int(1); 50]);
        let bytes = encode(&v);
        let size = size_at(&bytes, 0).unwrap();
        assert_eq!(size, bytes.len() as u64);
    }

    #[test]
    fn decode_truncated_buffer_is_eof() {
        let bytes = vec![tag::INT, 1, 2, 3];
        assert!(matches!(decode(&bytes), Err(StoreError::UnexpectedEof)));
    }
}
