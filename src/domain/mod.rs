//! Domain models for the proof-request protocol
//!
//! Challenges, envelopes, outcomes and the attestation/transaction records
//! read from the ledger side.

mod attestation;
mod circuit;
mod envelope;
mod types;

pub use attestation::*;
pub use circuit::*;
pub use envelope::*;
pub use types::*;
