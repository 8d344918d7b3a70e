use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::errors::{Result, StoreError};

/// A 12-byte identifier: 4 big-endian seconds-since-epoch bytes followed by
/// 8 random bytes. Equality and ordering are both byte-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub [u8; 12]);

impl ObjectId {
    #[must_use]
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        rand::rng().fill_bytes(&mut bytes[4..12]);
        Self(bytes)
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 24-character lowercase hex string.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidObjectId` when the string is not exactly
    /// 24 hex characters.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 24 {
            return Err(StoreError::InvalidObjectId);
        }
        let decoded = hex::decode(s).map_err(|_| StoreError::InvalidObjectId)?;
        let bytes: [u8; 12] = decoded.try_into().map_err(|_| StoreError::InvalidObjectId)?;
        Ok(Self(bytes))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let id = ObjectId::new();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 24);
        let back = ObjectId::from_hex(&hex).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn ordering_is_byte_lexicographic() {
        let a = ObjectId::from_bytes([0; 12]);
        let mut hi = [0u8; 12];
        hi[11] = 1;
        let b = ObjectId::from_bytes(hi);
        assert!(a < b);
    }
}
