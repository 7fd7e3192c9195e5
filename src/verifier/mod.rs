//! Proof verification
//!
//! A proof is accepted only if the structural reference check over its public
//! inputs passes and the delegated verifier (the proving backend, or a
//! deployed verifier contract) returns true. The structural check runs first
//! and a mismatch never reaches the delegate.

mod circuit;
mod reference;

pub use circuit::{CircuitLoader, CircuitRef};
pub use reference::{
    bytes_to_inputs, ensure_same_key, extract_bytes, PublicInputLayout, ReferenceCheck,
    SignatureBinding,
};

use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, Bytes};
use tracing::{debug, info, warn};

use crate::domain::FieldElement;
use crate::infra::{LedgerClient, LedgerError, ProofSystem, Result, VerificationError};

/// Where proofs are checked
#[derive(Clone)]
pub enum VerificationMode {
    /// Local verification by the proving backend against a compiled circuit
    Offline {
        circuit: CircuitRef,
        proof_system: Arc<dyn ProofSystem>,
    },
    /// Read-only call to a deployed verifier contract
    Onchain {
        verifier_contract: Address,
        ledger: Arc<dyn LedgerClient>,
    },
}

impl VerificationMode {
    pub fn label(&self) -> &'static str {
        match self {
            VerificationMode::Offline { .. } => "offline",
            VerificationMode::Onchain { .. } => "onchain",
        }
    }
}

impl std::fmt::Debug for VerificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationMode::Offline { circuit, .. } => {
                f.debug_struct("Offline").field("circuit", circuit).finish()
            }
            VerificationMode::Onchain {
                verifier_contract, ..
            } => f
                .debug_struct("Onchain")
                .field("verifier_contract", verifier_contract)
                .finish(),
        }
    }
}

/// Checks a proof's public inputs against reference values, then delegates
/// cryptographic verification.
pub struct ProofVerifier {
    mode: VerificationMode,
    reference: ReferenceCheck,
    layout: PublicInputLayout,
    binding: Option<SignatureBinding>,
    circuits: CircuitLoader,
}

impl ProofVerifier {
    pub fn new(mode: VerificationMode, reference: ReferenceCheck) -> Self {
        Self {
            mode,
            reference,
            layout: PublicInputLayout::default(),
            binding: None,
            circuits: CircuitLoader::default(),
        }
    }

    pub fn with_layout(mut self, layout: PublicInputLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Also require the exposed digest/signature to recover the exposed key
    pub fn with_signature_binding(mut self, binding: SignatureBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_circuit_loader(mut self, loader: CircuitLoader) -> Self {
        self.circuits = loader;
        self
    }

    pub fn mode(&self) -> &VerificationMode {
        &self.mode
    }

    pub fn reference(&self) -> &ReferenceCheck {
        &self.reference
    }

    /// Structural checks only; no delegated call
    pub fn check_public_inputs(&self, public_inputs: &[FieldElement]) -> Result<()> {
        self.reference.check(public_inputs, &self.layout)?;
        if let Some(binding) = &self.binding {
            binding.check(public_inputs)?;
        }
        Ok(())
    }

    /// Full verification: structural checks, then the delegated verifier
    pub async fn verify(&self, proof: &[u8], public_inputs: &[FieldElement]) -> Result<()> {
        self.check_public_inputs(public_inputs)?;

        let started = Instant::now();
        let valid = match &self.mode {
            VerificationMode::Offline {
                circuit,
                proof_system,
            } => {
                self.verify_offline(proof, public_inputs, circuit, Arc::clone(proof_system))
                    .await?
            }
            VerificationMode::Onchain {
                verifier_contract,
                ledger,
            } => {
                Self::verify_onchain(proof, public_inputs, *verifier_contract, ledger.as_ref())
                    .await?
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if !valid {
            warn!(mode = self.mode.label(), elapsed_ms, "Proof rejected by verifier");
            return Err(VerificationError::ProofInvalid(format!(
                "{} verifier returned false",
                self.mode.label()
            )));
        }

        info!(mode = self.mode.label(), elapsed_ms, "Proof verified");
        Ok(())
    }

    /// Run the proving backend's verifier on a blocking worker
    pub async fn verify_offline(
        &self,
        proof: &[u8],
        public_inputs: &[FieldElement],
        circuit: &CircuitRef,
        proof_system: Arc<dyn ProofSystem>,
    ) -> Result<bool> {
        let artifact = self.circuits.load(circuit).await?;
        let proof = proof.to_vec();
        let inputs = public_inputs.to_vec();

        debug!(inputs = inputs.len(), proof_len = proof.len(), "Running offline verification");
        let outcome =
            tokio::task::spawn_blocking(move || proof_system.verify(&artifact, &proof, &inputs))
                .await
                .map_err(|e| {
                    VerificationError::ProofInvalid(format!("verification task failed: {}", e))
                })?;

        outcome.map_err(|e| VerificationError::ProofInvalid(e.to_string()))
    }

    /// Ask a deployed verifier contract; its answer is authoritative
    pub async fn verify_onchain(
        proof: &[u8],
        public_inputs: &[FieldElement],
        verifier_contract: Address,
        ledger: &dyn LedgerClient,
    ) -> Result<bool> {
        debug!(%verifier_contract, inputs = public_inputs.len(), "Calling verifier contract");
        match ledger
            .call_verifier(
                verifier_contract,
                Bytes::copy_from_slice(proof),
                public_inputs.to_vec(),
            )
            .await
        {
            Ok(valid) => Ok(valid),
            Err(LedgerError::Reverted(reason)) => {
                debug!(%reason, "Verifier contract reverted");
                Ok(false)
            }
            Err(e) => Err(VerificationError::LedgerUnavailable(e.to_string())),
        }
    }
}
