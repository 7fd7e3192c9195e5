//! Structural checks over a proof's public inputs
//!
//! Byte-array circuit inputs are exposed one byte per field element, so a
//! 20-byte address occupies 20 consecutive public inputs. Which values the
//! circuit exposes, and where, is fixed by the circuit and configured here;
//! it is never inferred from the inputs themselves.

use alloy::primitives::{Address, B256};
use tracing::warn;

use crate::crypto::{recover_public_key, PublicKeyPoint, RecoverableSignature, SIGNATURE_LEN};
use crate::domain::FieldElement;
use crate::infra::{Result, VerificationError};

/// Offsets of the reference values in the public-input sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputLayout {
    /// First of 20 inputs holding the attester contract address
    pub contract_address_offset: usize,
    /// First of 32 inputs holding the attester key's x coordinate
    pub pubkey_x_offset: usize,
    /// First of 32 inputs holding the attester key's y coordinate
    pub pubkey_y_offset: usize,
}

impl Default for PublicInputLayout {
    fn default() -> Self {
        Self {
            contract_address_offset: 0,
            pubkey_x_offset: 0,
            pubkey_y_offset: 32,
        }
    }
}

/// Read `len` byte-valued public inputs starting at `offset`
pub fn extract_bytes(inputs: &[FieldElement], offset: usize, len: usize) -> Result<Vec<u8>> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= inputs.len())
        .ok_or_else(|| {
            VerificationError::MalformedResponse(format!(
                "public inputs too short: need {} elements at offset {}, have {}",
                len,
                offset,
                inputs.len()
            ))
        })?;

    inputs[offset..end]
        .iter()
        .enumerate()
        .map(|(i, fe)| {
            fe.as_byte().ok_or_else(|| {
                VerificationError::MalformedResponse(format!(
                    "public input {} is not a byte value",
                    offset + i
                ))
            })
        })
        .collect()
}

fn extract_array<const N: usize>(inputs: &[FieldElement], offset: usize) -> Result<[u8; N]> {
    let bytes = extract_bytes(inputs, offset, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Known-good value the proof's public inputs must carry.
///
/// Exactly one is active per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceCheck {
    /// Attester public key (legacy circuits)
    Pubkey(PublicKeyPoint),
    /// Attester contract address
    ContractAddress(Address),
}

impl ReferenceCheck {
    pub fn check(&self, inputs: &[FieldElement], layout: &PublicInputLayout) -> Result<()> {
        match self {
            ReferenceCheck::ContractAddress(expected) => {
                let actual =
                    Address::from(extract_array::<20>(inputs, layout.contract_address_offset)?);
                if actual != *expected {
                    warn!(%expected, %actual, "Contract address mismatch in public inputs");
                    return Err(VerificationError::ContractMismatch {
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
                Ok(())
            }
            ReferenceCheck::Pubkey(expected) => {
                let actual = PublicKeyPoint {
                    x: extract_array::<32>(inputs, layout.pubkey_x_offset)?,
                    y: extract_array::<32>(inputs, layout.pubkey_y_offset)?,
                };
                ensure_same_key(expected, &actual)
            }
        }
    }
}

/// Compare two keys coordinate by coordinate
pub fn ensure_same_key(expected: &PublicKeyPoint, actual: &PublicKeyPoint) -> Result<()> {
    if expected != actual {
        warn!(
            expected = %expected.to_hex(),
            actual = %actual.to_hex(),
            "Public key mismatch"
        );
        return Err(VerificationError::PubkeyMismatch {
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        });
    }
    Ok(())
}

/// Requester-side digest/signature binding.
///
/// For circuits that expose the signed digest, the signature and the signer's
/// key, the key recovered from (digest, signature) must equal the exposed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureBinding {
    /// First of 32 inputs holding the signed digest
    pub digest_offset: usize,
    /// First of 65 inputs holding `r || s || v`
    pub signature_offset: usize,
    /// First of 32 inputs holding the key's x coordinate
    pub pubkey_x_offset: usize,
    /// First of 32 inputs holding the key's y coordinate
    pub pubkey_y_offset: usize,
}

impl SignatureBinding {
    pub fn check(&self, inputs: &[FieldElement]) -> Result<PublicKeyPoint> {
        let digest = B256::from(extract_array::<32>(inputs, self.digest_offset)?);
        let sig_bytes = extract_bytes(inputs, self.signature_offset, SIGNATURE_LEN)?;
        let exposed = PublicKeyPoint {
            x: extract_array::<32>(inputs, self.pubkey_x_offset)?,
            y: extract_array::<32>(inputs, self.pubkey_y_offset)?,
        };

        let signature = RecoverableSignature::from_bytes(&sig_bytes)
            .map_err(|e| VerificationError::RecoveryError(e.to_string()))?;
        let recovered = recover_public_key(&digest, &signature)
            .map_err(|e| VerificationError::RecoveryError(e.to_string()))?;

        ensure_same_key(&exposed, &recovered)?;
        Ok(recovered)
    }
}

/// Encode bytes as byte-valued field elements (the inverse of extraction)
pub fn bytes_to_inputs(bytes: &[u8]) -> Vec<FieldElement> {
    bytes.iter().copied().map(FieldElement::from_byte).collect()
}
