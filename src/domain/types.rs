//! Core type definitions for the proof-request protocol
//!
//! Challenges, nonces and field elements shared by the requester and the
//! proof portal.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Width of a single encoded public input (one BN254 field element)
pub const FIELD_ELEMENT_LEN: usize = 32;

/// Opaque single-use challenge identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(pub String);

impl Nonce {
    /// Generate a fresh random nonce
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Nonce {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Challenge issued by the requester at handshake start.
///
/// On the wire the issue time travels as `timestamp` (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Challenge {
    pub origin: String,
    pub nonce: Nonce,
    #[serde(rename = "timestamp")]
    pub issued_at: i64,
}

impl Challenge {
    /// Issue a fresh challenge for `origin` at the current wall-clock time
    pub fn issue(origin: impl Into<String>) -> Self {
        Self::issue_at(origin, chrono::Utc::now().timestamp())
    }

    /// Issue a fresh challenge with an explicit timestamp
    pub fn issue_at(origin: impl Into<String>, issued_at: i64) -> Self {
        Self {
            origin: origin.into(),
            nonce: Nonce::generate(),
            issued_at,
        }
    }
}

/// One public input of a proof: a 32-byte big-endian field element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldElement(pub [u8; FIELD_ELEMENT_LEN]);

impl FieldElement {
    /// Field element holding a single byte value (the encoding of a `u8`
    /// circuit input)
    pub fn from_byte(b: u8) -> Self {
        let mut bytes = [0u8; FIELD_ELEMENT_LEN];
        bytes[FIELD_ELEMENT_LEN - 1] = b;
        Self(bytes)
    }

    /// Returns the value if the element encodes a single byte
    pub fn as_byte(&self) -> Option<u8> {
        let (high, low) = self.0.split_at(FIELD_ELEMENT_LEN - 1);
        if high.iter().all(|b| *b == 0) {
            Some(low[0])
        } else {
            None
        }
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse a hex string (with or without 0x prefix) of exactly 32 bytes
    pub fn from_hex(s: &str) -> Result<Self, String> {
        let bytes = decode_hex(s)?;
        let arr: [u8; FIELD_ELEMENT_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| format!("expected 32-byte field element, got {} bytes", v.len()))?;
        Ok(Self(arr))
    }
}

impl Serialize for FieldElement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Decode a hex string, accepting an optional 0x prefix
pub fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let hex_str = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(hex_str).map_err(|e| format!("invalid hex: {}", e))
}

/// Serde module for byte strings as 0x-prefixed hex
pub mod bytes_hex_0x {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::decode_hex(&s).map_err(serde::de::Error::custom)
    }
}
