//! Attestation and transaction records sourced from external collaborators

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::crypto::RecoverableSignature;

/// An attestation as reported by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    /// Transaction that created the attestation on the ledger
    pub transaction_id: B256,
    pub attester: Address,
    pub recipient: Address,
    pub schema_id: B256,
    /// Unix seconds; 0 when not revoked
    pub revocation_time: u64,
    /// Unix seconds; 0 when the attestation never expires
    pub expiration_time: u64,
    /// Unix seconds the attestation was issued
    pub issued_at: u64,
}

impl AttestationRecord {
    pub fn is_revoked(&self) -> bool {
        self.revocation_time != 0
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration_time != 0 && self.expiration_time <= now
    }

    /// Not revoked and either unexpired or without expiry
    pub fn is_active(&self, now: u64) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}

/// Select the most recent active attestation.
///
/// Ordering is by descending issuance time; revoked and expired records are
/// skipped.
pub fn select_latest<I>(records: I, now: u64) -> Option<AttestationRecord>
where
    I: IntoIterator<Item = AttestationRecord>,
{
    records
        .into_iter()
        .filter(|r| r.is_active(now))
        .max_by_key(|r| r.issued_at)
}

/// Registry lookup parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationQuery {
    pub recipient: Address,
    pub attester: Address,
    pub schema_id: B256,
    /// Reference time for the expiry filter (unix seconds)
    pub now: u64,
}

/// Raw transaction fields as returned by the ledger node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub input_data: Vec<u8>,
    pub signature: RecoverableSignature,
}
