//! Proof portal: the prover side of the handshake
//!
//! Runs inside the isolated context. It looks up the user's attestation,
//! fetches the attesting transaction, has the user's wallet sign the calldata
//! digest, and proves knowledge of the whole chain without revealing it.

use std::sync::Arc;

use alloy::primitives::{eip191_hash_message, Address, B256};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use tracing::{debug, info, instrument};

use crate::crypto::{
    recover_public_key, sign_prehash, CalldataPrefix, PublicKeyPoint, RecoverableSignature,
    RecoveryError,
};
use crate::domain::{AttestationQuery, Challenge, CircuitInputs, Nonce, ProofEnvelope};
use crate::infra::{
    AttestationRegistry, LedgerClient, LedgerError, ProofSystem, ProofSystemError, RegistryError,
    SignerError, VerificationError, WalletSigner,
};
use crate::verifier::{CircuitLoader, CircuitRef};

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("no active attestation for {0}")]
    NoAttestation(Address),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error("signature recovery failed: {0}")]
    Recovery(#[from] RecoveryError),

    /// The wallet's signature recovers to a different account
    #[error("recovered signer {recovered} does not match wallet {expected}")]
    PubkeyMismatch { expected: Address, recovered: Address },

    #[error(transparent)]
    Circuit(VerificationError),

    #[error(transparent)]
    Proving(#[from] ProofSystemError),

    #[error("proving task failed: {0}")]
    Task(String),
}

/// Which attestations the portal proves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestationSource {
    /// Contract that issues attestations (also a circuit input)
    pub attester: Address,
    pub schema_id: B256,
}

pub struct ProofPortal {
    wallet: Arc<dyn WalletSigner>,
    registry: Arc<dyn AttestationRegistry>,
    ledger: Arc<dyn LedgerClient>,
    proof_system: Arc<dyn ProofSystem>,
    circuit: CircuitRef,
    circuits: CircuitLoader,
    source: AttestationSource,
}

impl ProofPortal {
    pub fn new(
        wallet: Arc<dyn WalletSigner>,
        registry: Arc<dyn AttestationRegistry>,
        ledger: Arc<dyn LedgerClient>,
        proof_system: Arc<dyn ProofSystem>,
        circuit: CircuitRef,
        source: AttestationSource,
    ) -> Self {
        Self {
            wallet,
            registry,
            ledger,
            proof_system,
            circuit,
            circuits: CircuitLoader::default(),
            source,
        }
    }

    pub fn with_circuit_loader(mut self, loader: CircuitLoader) -> Self {
        self.circuits = loader;
        self
    }

    /// Build the circuit witness for the connected wallet
    pub async fn prepare_inputs(&self) -> Result<CircuitInputs, PortalError> {
        let user_address = self.wallet.address();
        let now = chrono::Utc::now().timestamp().max(0) as u64;

        let attestation = self
            .registry
            .latest_attestation(AttestationQuery {
                recipient: user_address,
                attester: self.source.attester,
                schema_id: self.source.schema_id,
                now,
            })
            .await?
            .ok_or(PortalError::NoAttestation(user_address))?;
        debug!(tx = %attestation.transaction_id, "Found attestation");

        let tx = self.ledger.transaction(attestation.transaction_id).await?;
        let calldata = CalldataPrefix::from_input(&tx.input_data);
        debug!(input_len = tx.input_data.len(), "Extracted calldata prefix");

        let raw_digest = calldata.digest();
        let digest = calldata.signed_message_digest();

        // the wallet applies the signed-message header itself
        let signature = self.wallet.sign_message(raw_digest.to_vec()).await?;
        let user_pubkey = recover_public_key(&digest, &signature)?;
        let recovered = user_pubkey.to_address();
        if recovered != user_address {
            return Err(PortalError::PubkeyMismatch {
                expected: user_address,
                recovered,
            });
        }

        Ok(CircuitInputs {
            calldata,
            contract_address: self.source.attester,
            user_address,
            digest,
            user_signature: signature,
            user_pubkey,
        })
    }

    /// Produce the envelope answering a challenge from `origin`
    #[instrument(skip(self, nonce), fields(%nonce))]
    pub async fn generate(&self, origin: &str, nonce: &Nonce) -> Result<ProofEnvelope, PortalError> {
        let inputs = self.prepare_inputs().await?;
        let artifact = self
            .circuits
            .load(&self.circuit)
            .await
            .map_err(PortalError::Circuit)?;

        let proof_system = Arc::clone(&self.proof_system);
        let started = std::time::Instant::now();
        let generated =
            tokio::task::spawn_blocking(move || proof_system.prove(&artifact, &inputs))
                .await
                .map_err(|e| PortalError::Task(e.to_string()))??;
        info!(
            proving_ms = started.elapsed().as_millis() as u64,
            public_inputs = generated.public_inputs.len(),
            "Proof generated"
        );

        Ok(ProofEnvelope {
            proof: generated.proof,
            public_inputs: generated.public_inputs,
            meta: Challenge {
                origin: origin.to_string(),
                nonce: nonce.clone(),
                issued_at: chrono::Utc::now().timestamp(),
            },
        })
    }
}

/// Wallet backed by an in-memory secp256k1 key
pub struct LocalWalletSigner {
    key: SigningKey,
    address: Address,
}

impl LocalWalletSigner {
    pub fn new(key: SigningKey) -> Self {
        let address = PublicKeyPoint::from_verifying_key(key.verifying_key()).to_address();
        Self { key, address }
    }

    pub fn from_hex(secret: &str) -> Result<Self, SignerError> {
        let bytes = hex::decode(secret.trim_start_matches("0x"))
            .map_err(|e| SignerError::Failed(format!("invalid key hex: {}", e)))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| SignerError::Failed(format!("invalid key: {}", e)))?;
        Ok(Self::new(key))
    }

    pub fn public_key(&self) -> PublicKeyPoint {
        PublicKeyPoint::from_verifying_key(self.key.verifying_key())
    }
}

#[async_trait]
impl WalletSigner for LocalWalletSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, message: Vec<u8>) -> Result<RecoverableSignature, SignerError> {
        let hash = eip191_hash_message(&message);
        sign_prehash(&self.key, &hash).map_err(|e| SignerError::Failed(e.to_string()))
    }
}
