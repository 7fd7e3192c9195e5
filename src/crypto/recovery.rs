//! Public key recovery from recoverable secp256k1 signatures
//!
//! Signatures arrive as `(r, s, v)` triples, either from a ledger transaction
//! or from a wallet's personal-message signing. `v` is accepted in its raw
//! (0/1), legacy (27/28) and EIP-155 (`chain_id * 2 + 35 + parity`) forms.

use alloy::primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

/// Byte length of `r || s || v`
pub const SIGNATURE_LEN: usize = 65;

/// Error type for recovery operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoveryError {
    #[error("invalid signature length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u64),

    #[error("invalid signature scalars")]
    InvalidScalars,

    #[error("no public key recoverable for digest")]
    RecoveryFailed,

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Recoverable ECDSA signature in `(r, s, v)` form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u64,
}

impl RecoverableSignature {
    /// Parse `r || s || v` (65 bytes)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecoveryError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(RecoveryError::InvalidLength {
                expected: SIGNATURE_LEN,
                actual: bytes.len(),
            });
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self {
            r,
            s,
            v: bytes[64] as u64,
        })
    }

    /// Build from separately encoded components, checking each length
    pub fn from_parts(r: &[u8], s: &[u8], v: u64) -> Result<Self, RecoveryError> {
        let r: [u8; 32] = r.try_into().map_err(|_| RecoveryError::InvalidLength {
            expected: 32,
            actual: r.len(),
        })?;
        let s: [u8; 32] = s.try_into().map_err(|_| RecoveryError::InvalidLength {
            expected: 32,
            actual: s.len(),
        })?;
        Ok(Self { r, s, v })
    }

    /// `r || s || v` with `v` in legacy 27/28 form
    pub fn to_bytes(&self) -> Result<[u8; SIGNATURE_LEN], RecoveryError> {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = 27 + self.parity()?;
        Ok(out)
    }

    /// `r || s`, the form a circuit consumes
    pub fn rs_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Normalised y-parity (0 or 1)
    pub fn parity(&self) -> Result<u8, RecoveryError> {
        match self.v {
            0 | 1 => Ok(self.v as u8),
            27 | 28 => Ok((self.v - 27) as u8),
            v if v >= 35 => Ok(((v - 35) % 2) as u8),
            v => Err(RecoveryError::InvalidRecoveryId(v)),
        }
    }
}

/// Uncompressed secp256k1 point as fixed-width big-endian coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyPoint {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl PublicKeyPoint {
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let encoded = key.to_encoded_point(false);
        // 0x04 || x || y
        let bytes = encoded.as_bytes();
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&bytes[1..33]);
        y.copy_from_slice(&bytes[33..65]);
        Self { x, y }
    }

    /// Ledger address controlled by this key
    pub fn to_address(&self) -> Address {
        let mut raw = [0u8; 64];
        raw[..32].copy_from_slice(&self.x);
        raw[32..].copy_from_slice(&self.y);
        let hash = keccak256(raw);
        Address::from_slice(&hash[12..])
    }

    pub fn to_hex(&self) -> String {
        format!("0x04{}{}", hex::encode(self.x), hex::encode(self.y))
    }
}

/// Recover the public key whose private key produced `signature` over `digest`
pub fn recover_public_key(
    digest: &B256,
    signature: &RecoverableSignature,
) -> Result<PublicKeyPoint, RecoveryError> {
    let recovery_id = RecoveryId::from_byte(signature.parity()?)
        .ok_or(RecoveryError::InvalidRecoveryId(signature.v))?;
    let sig =
        Signature::from_slice(&signature.rs_bytes()).map_err(|_| RecoveryError::InvalidScalars)?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|_| RecoveryError::RecoveryFailed)?;
    Ok(PublicKeyPoint::from_verifying_key(&key))
}

/// Sign a prehashed digest, producing a recoverable signature with `v` in
/// 27/28 form
pub fn sign_prehash(
    key: &SigningKey,
    digest: &B256,
) -> Result<RecoverableSignature, RecoveryError> {
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(digest.as_slice())
        .map_err(|e| RecoveryError::SigningFailed(e.to_string()))?;
    let bytes = sig.to_bytes();
    RecoverableSignature::from_parts(&bytes[..32], &bytes[32..], 27 + recovery_id.to_byte() as u64)
}
