//! Trait definitions for external collaborators
//!
//! The ledger node, the attestation registry, the proving backend and the
//! user's wallet are opaque capabilities; the protocol core only sees these
//! seams.

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::crypto::RecoverableSignature;
use crate::domain::{
    AttestationQuery, AttestationRecord, CircuitArtifact, CircuitInputs, FieldElement,
    GeneratedProof, TransactionRecord,
};

/// Errors from the ledger node
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Connection could not be established or the transport failed
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The call executed and reverted
    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("transaction not found: {0}")]
    NotFound(B256),

    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

/// Errors from the attestation registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Request(String),

    #[error("registry query error: {0}")]
    Query(String),

    #[error("malformed registry response: {0}")]
    Malformed(String),
}

/// Errors from the proving backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofSystemError {
    #[error("witness generation failed: {0}")]
    Witness(String),

    #[error("proving failed: {0}")]
    Proving(String),

    #[error("verification failed to run: {0}")]
    Verification(String),
}

/// Errors from the wallet
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("user rejected signature request")]
    Rejected,

    #[error("signing failed: {0}")]
    Failed(String),
}

/// Read-only access to the ledger.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Call `verify(bytes, bytes32[])` on a deployed verifier contract
    async fn call_verifier(
        &self,
        contract: Address,
        proof: Bytes,
        public_inputs: Vec<FieldElement>,
    ) -> Result<bool, LedgerError>;

    /// Fetch raw transaction fields by hash
    async fn transaction(&self, tx_id: B256) -> Result<TransactionRecord, LedgerError>;
}

/// Attestation registry lookup.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AttestationRegistry: Send + Sync {
    /// Most recent active attestation matching the query, if any
    async fn latest_attestation(
        &self,
        query: AttestationQuery,
    ) -> Result<Option<AttestationRecord>, RegistryError>;
}

/// Proving backend.
///
/// Both operations are CPU-bound and may take seconds; callers run them on a
/// blocking worker.
#[cfg_attr(test, automock)]
pub trait ProofSystem: Send + Sync {
    /// Check `proof` against `public_inputs` under `circuit`
    fn verify(
        &self,
        circuit: &CircuitArtifact,
        proof: &[u8],
        public_inputs: &[FieldElement],
    ) -> Result<bool, ProofSystemError>;

    /// Execute the circuit on `inputs` and produce a proof
    fn prove(
        &self,
        circuit: &CircuitArtifact,
        inputs: &CircuitInputs,
    ) -> Result<GeneratedProof, ProofSystemError>;
}

/// The user's wallet.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign `message` as a personal message (the wallet applies the
    /// signed-message header before hashing)
    async fn sign_message(&self, message: Vec<u8>) -> Result<RecoverableSignature, SignerError>;
}
