//! Digest recomputation over attestation calldata
//!
//! Both the proof portal and the requester derive digests from the same
//! fixed-width calldata prefix:
//! - raw digest: `keccak256(prefix)`
//! - signed-message digest: `keccak256("\x19Ethereum Signed Message:\n32" || raw)`
//!
//! A signature produced by a wallet's personal-message signing is over the
//! signed-message digest, never the raw one.

use alloy::primitives::{keccak256, B256};

/// Width of the calldata prefix that is hashed, signed and proven
pub const CALLDATA_PREFIX_LEN: usize = 37;

const SIGNED_MESSAGE_HEADER_LEN: usize = 28;

/// Header a wallet prepends when signing a 32-byte message
pub const SIGNED_MESSAGE_HEADER: &[u8; SIGNED_MESSAGE_HEADER_LEN] =
    b"\x19Ethereum Signed Message:\n32";

/// Fixed-width calldata prefix.
///
/// Shorter inputs are zero-padded on the right, longer inputs are truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalldataPrefix([u8; CALLDATA_PREFIX_LEN]);

impl CalldataPrefix {
    pub fn from_input(input: &[u8]) -> Self {
        let mut bytes = [0u8; CALLDATA_PREFIX_LEN];
        let n = input.len().min(CALLDATA_PREFIX_LEN);
        bytes[..n].copy_from_slice(&input[..n]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CALLDATA_PREFIX_LEN] {
        &self.0
    }

    /// Raw digest of this prefix
    pub fn digest(&self) -> B256 {
        compute_digest(&self.0)
    }

    /// Signed-message digest of this prefix
    pub fn signed_message_digest(&self) -> B256 {
        signed_message_digest(&self.digest())
    }
}

impl AsRef<[u8]> for CalldataPrefix {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Keccak-256 of an already-normalised calldata prefix
pub fn compute_digest(calldata_prefix: &[u8]) -> B256 {
    keccak256(calldata_prefix)
}

/// Digest a wallet signs when asked to sign `raw` as a personal message
pub fn signed_message_digest(raw: &B256) -> B256 {
    let mut preimage = [0u8; SIGNED_MESSAGE_HEADER_LEN + 32];
    preimage[..SIGNED_MESSAGE_HEADER_LEN].copy_from_slice(SIGNED_MESSAGE_HEADER);
    preimage[SIGNED_MESSAGE_HEADER_LEN..].copy_from_slice(raw.as_slice());
    keccak256(preimage)
}
