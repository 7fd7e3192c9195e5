//! Cryptographic utilities for the proof-request protocol
//!
//! Provides:
//! - Calldata prefix normalisation and keccak-256 digests
//! - Signed-message digest recomputation
//! - secp256k1 public key recovery from `(r, s, v)` signatures

mod digest;
mod recovery;


pub use digest::*;
pub use recovery::*;
