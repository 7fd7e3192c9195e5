//! zk-attestor Library
//!
//! Privacy-preserving proof of a ledger attestation. A requester issues a
//! one-time challenge to an isolated proof portal, which proves the user holds
//! an attestation without revealing the wallet or its history; the requester
//! validates the response and verifies the proof offline or on the ledger.
//!
//! ## Modules
//!
//! - [`domain`] - Challenges, envelopes, attestation and transaction records
//! - [`infra`] - Error taxonomy, nonce registry, metadata validation, collaborator traits
//! - [`crypto`] - Calldata digests and secp256k1 key recovery
//! - [`verifier`] - Public-input reference checks and proof verification
//! - [`handshake`] - Challenge/response coordination with the portal
//! - [`portal`] - Prover-side pipeline
//! - [`ledger`] - JSON-RPC ledger client
//! - [`registry`] - EAS GraphQL attestation registry client
//! - [`config`] - Environment configuration
//! - [`telemetry`] - Logging setup

pub mod config;
pub mod crypto;
pub mod domain;
pub mod handshake;
pub mod infra;
pub mod ledger;
pub mod portal;
pub mod registry;
pub mod telemetry;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use domain::{
    AttestationRecord, Challenge, FieldElement, Nonce, ProofEnvelope, TransactionRecord,
    VerificationOutcome,
};

pub use handshake::{HandshakeConfig, HandshakeCoordinator, HandshakeReport, HandshakeState};

pub use infra::{
    FailureKind, MetadataValidator, NonceRegistry, Result, VerificationError,
};

pub use verifier::{ProofVerifier, ReferenceCheck, VerificationMode};
