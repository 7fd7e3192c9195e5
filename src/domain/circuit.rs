//! Circuit artifacts, witnesses and generated proofs

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use super::types::FieldElement;
use crate::crypto::{CalldataPrefix, PublicKeyPoint, RecoverableSignature};

/// Compiled circuit as published by the circuit build (`target/<name>.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitArtifact {
    /// Base64 ACIR bytecode consumed by the proving backend
    pub bytecode: String,
    #[serde(default)]
    pub abi: serde_json::Value,
    #[serde(default)]
    pub noir_version: Option<String>,
    #[serde(default)]
    pub hash: Option<serde_json::Value>,
}

/// Witness for the attestation circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitInputs {
    pub calldata: CalldataPrefix,
    pub contract_address: Address,
    pub user_address: Address,
    pub digest: B256,
    pub user_signature: RecoverableSignature,
    pub user_pubkey: PublicKeyPoint,
}

impl CircuitInputs {
    /// Named byte arrays in the circuit's parameter order
    pub fn to_witness_map(&self) -> serde_json::Value {
        serde_json::json!({
            "calldata": self.calldata.as_bytes().to_vec(),
            "contract_address": self.contract_address.as_slice().to_vec(),
            "user_address": self.user_address.as_slice().to_vec(),
            "digest": self.digest.as_slice().to_vec(),
            "user_sig": self.user_signature.rs_bytes().to_vec(),
            "user_pubkey_x": self.user_pubkey.x.to_vec(),
            "user_pubkey_y": self.user_pubkey.y.to_vec(),
        })
    }
}

/// Output of proof generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProof {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<FieldElement>,
}
