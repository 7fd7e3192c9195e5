//! Response validation pipeline

use std::sync::Arc;

use crate::domain::{Nonce, ProofEnvelope, VerificationOutcome};
use crate::infra::MetadataValidator;
use crate::verifier::ProofVerifier;

/// Metadata gate followed by proof verification.
///
/// Shared by the coordinator and by callers that receive envelopes out of
/// band.
#[derive(Clone)]
pub struct ResponseValidator {
    expected_origin: String,
    metadata: Arc<MetadataValidator>,
    verifier: Arc<ProofVerifier>,
}

impl ResponseValidator {
    pub fn new(
        expected_origin: impl Into<String>,
        metadata: Arc<MetadataValidator>,
        verifier: Arc<ProofVerifier>,
    ) -> Self {
        Self {
            expected_origin: expected_origin.into(),
            metadata,
            verifier,
        }
    }

    pub fn expected_origin(&self) -> &str {
        &self.expected_origin
    }

    /// Burn a challenge nonce whose handshake ended without a validated
    /// response
    pub async fn retire(&self, nonce: &Nonce) {
        self.metadata.nonces().retire(nonce).await;
    }

    /// Validate an envelope: metadata first, then the proof.
    ///
    /// The envelope is consumed; a second validation of the same material
    /// fails on its nonce.
    pub async fn validate(&self, envelope: ProofEnvelope) -> VerificationOutcome {
        let ProofEnvelope {
            proof,
            public_inputs,
            meta,
        } = envelope;

        if let Err(e) = self.metadata.validate(&meta, &self.expected_origin).await {
            return VerificationOutcome::failure(e);
        }
        if let Err(e) = self.verifier.verify(&proof, &public_inputs).await {
            return VerificationOutcome::failure(e);
        }

        VerificationOutcome::Success {
            proof,
            public_inputs,
        }
    }
}
