//! Proof envelope and verification outcome
//!
//! The envelope is the single message a proof portal sends back to the
//! requester. It is untrusted until every validation step has passed and is
//! consumed by value when validated.

use serde::{Deserialize, Serialize};

use super::types::{bytes_hex_0x, Challenge, FieldElement};
use crate::infra::{FailureKind, VerificationError};

/// Message type tag of a proof response
pub const PROOF_RESULT_TYPE: &str = "proof-result";

/// Message type tag of a challenge sent over the handshake channel
pub const CHALLENGE_MESSAGE_TYPE: &str = "proof-challenge";

/// Message type tag acknowledging a challenge message
pub const CHALLENGE_ACK_TYPE: &str = "proof-challenge-ack";

/// Proof material returned by the isolated proof-generation context
#[derive(Debug, PartialEq, Eq)]
pub struct ProofEnvelope {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<FieldElement>,
    pub meta: Challenge,
}

/// Strict wire schema of a `proof-result` message
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ProofResultMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(with = "bytes_hex_0x")]
    proof: Vec<u8>,
    public_inputs: Vec<FieldElement>,
    meta: Challenge,
}

impl ProofEnvelope {
    /// Decode a `proof-result` message.
    ///
    /// Any deviation from the schema is `MalformedResponse`.
    pub fn from_message(value: serde_json::Value) -> Result<Self, VerificationError> {
        let msg: ProofResultMessage = serde_json::from_value(value)
            .map_err(|e| VerificationError::MalformedResponse(e.to_string()))?;

        if msg.message_type != PROOF_RESULT_TYPE {
            return Err(VerificationError::MalformedResponse(format!(
                "unexpected message type {}",
                msg.message_type
            )));
        }
        if msg.proof.is_empty() {
            return Err(VerificationError::MalformedResponse(
                "empty proof".to_string(),
            ));
        }
        if msg.meta.origin.is_empty() || msg.meta.nonce.as_str().is_empty() {
            return Err(VerificationError::MalformedResponse(
                "meta.origin and meta.nonce are required".to_string(),
            ));
        }

        Ok(Self {
            proof: msg.proof,
            public_inputs: msg.public_inputs,
            meta: msg.meta,
        })
    }

    /// Encode as a `proof-result` message
    pub fn to_message(&self) -> serde_json::Value {
        serde_json::json!({
            "type": PROOF_RESULT_TYPE,
            "proof": format!("0x{}", hex::encode(&self.proof)),
            "publicInputs": self.public_inputs,
            "meta": self.meta,
        })
    }
}

/// Terminal result of one handshake
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Success {
        proof: Vec<u8>,
        public_inputs: Vec<FieldElement>,
    },
    Failure {
        reason: VerificationError,
    },
}

impl VerificationOutcome {
    pub fn failure(reason: VerificationError) -> Self {
        VerificationOutcome::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Success { .. })
    }

    pub fn reason(&self) -> Option<&VerificationError> {
        match self {
            VerificationOutcome::Success { .. } => None,
            VerificationOutcome::Failure { reason } => Some(reason),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.reason().map(VerificationError::kind)
    }
}
