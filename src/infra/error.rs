//! Error types for proof-request validation

use std::fmt;

use thiserror::Error;

/// Reasons a handshake can fail. Every variant is terminal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The isolated execution context could not be created
    #[error("launch blocked: {0}")]
    LaunchBlocked(String),

    /// No response arrived before the deadline
    #[error("timed out after {waited_secs}s waiting for proof")]
    Timeout { waited_secs: u64 },

    /// Response metadata names a different requester origin
    #[error("origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch { expected: String, actual: String },

    /// Response timestamp outside the freshness window
    #[error("timestamp out of range: age {age_secs}s")]
    TimestampOutOfRange { age_secs: i64 },

    /// Nonce already consumed
    #[error("replay detected: nonce {nonce} already used")]
    ReplayDetected { nonce: String },

    /// Signature could not be parsed or a key could not be recovered
    #[error("signature recovery failed: {0}")]
    RecoveryError(String),

    /// Public key differs from the reference key
    #[error("public key mismatch: expected {expected}, got {actual}")]
    PubkeyMismatch { expected: String, actual: String },

    /// Contract address in public inputs differs from the reference
    #[error("contract mismatch: expected {expected}, got {actual}")]
    ContractMismatch { expected: String, actual: String },

    /// Proof rejected by the verifier backend
    #[error("invalid proof: {0}")]
    ProofInvalid(String),

    /// Ledger node unreachable
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Circuit artifact could not be loaded for offline verification
    #[error("circuit unavailable: {0}")]
    CircuitUnavailable(String),

    /// Response does not match the expected schema
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Bug in the requester itself; says nothing about the response
    #[error("internal error: {0}")]
    Internal(String),
}

/// Fieldless discriminant of [`VerificationError`], for matching and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    LaunchBlocked,
    Timeout,
    OriginMismatch,
    TimestampOutOfRange,
    ReplayDetected,
    RecoveryError,
    PubkeyMismatch,
    ContractMismatch,
    ProofInvalid,
    LedgerUnavailable,
    CircuitUnavailable,
    MalformedResponse,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::LaunchBlocked => "launch_blocked",
            FailureKind::Timeout => "timeout",
            FailureKind::OriginMismatch => "origin_mismatch",
            FailureKind::TimestampOutOfRange => "timestamp_out_of_range",
            FailureKind::ReplayDetected => "replay_detected",
            FailureKind::RecoveryError => "recovery_error",
            FailureKind::PubkeyMismatch => "pubkey_mismatch",
            FailureKind::ContractMismatch => "contract_mismatch",
            FailureKind::ProofInvalid => "proof_invalid",
            FailureKind::LedgerUnavailable => "ledger_unavailable",
            FailureKind::CircuitUnavailable => "circuit_unavailable",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::Internal => "internal",
        }
    }

    /// Failures that indicate tampering or a forged response
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            FailureKind::OriginMismatch
                | FailureKind::TimestampOutOfRange
                | FailureKind::ReplayDetected
                | FailureKind::PubkeyMismatch
                | FailureKind::ContractMismatch
        )
    }

    /// Failures caused by the environment rather than the response
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            FailureKind::LaunchBlocked
                | FailureKind::Timeout
                | FailureKind::LedgerUnavailable
                | FailureKind::CircuitUnavailable
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VerificationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            VerificationError::LaunchBlocked(_) => FailureKind::LaunchBlocked,
            VerificationError::Timeout { .. } => FailureKind::Timeout,
            VerificationError::OriginMismatch { .. } => FailureKind::OriginMismatch,
            VerificationError::TimestampOutOfRange { .. } => FailureKind::TimestampOutOfRange,
            VerificationError::ReplayDetected { .. } => FailureKind::ReplayDetected,
            VerificationError::RecoveryError(_) => FailureKind::RecoveryError,
            VerificationError::PubkeyMismatch { .. } => FailureKind::PubkeyMismatch,
            VerificationError::ContractMismatch { .. } => FailureKind::ContractMismatch,
            VerificationError::ProofInvalid(_) => FailureKind::ProofInvalid,
            VerificationError::LedgerUnavailable(_) => FailureKind::LedgerUnavailable,
            VerificationError::CircuitUnavailable(_) => FailureKind::CircuitUnavailable,
            VerificationError::MalformedResponse(_) => FailureKind::MalformedResponse,
            VerificationError::Internal(_) => FailureKind::Internal,
        }
    }

    pub fn is_security_violation(&self) -> bool {
        self.kind().is_security_violation()
    }
}

/// Result type for validation operations
pub type Result<T> = std::result::Result<T, VerificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let replay = VerificationError::ReplayDetected {
            nonce: "n".to_string(),
        };
        assert!(replay.is_security_violation());
        assert!(!replay.kind().is_environmental());

        let timeout = VerificationError::Timeout { waited_secs: 120 };
        assert!(!timeout.is_security_violation());
        assert!(timeout.kind().is_environmental());

        let ledger = VerificationError::LedgerUnavailable("connection refused".to_string());
        assert!(ledger.kind().is_environmental());

        let internal = VerificationError::Internal("bad transition".to_string());
        assert!(!internal.is_security_violation());
        assert!(!internal.kind().is_environmental());
        assert_eq!(internal.kind().as_str(), "internal");
    }

    #[test]
    fn test_display_carries_detail() {
        let err = VerificationError::OriginMismatch {
            expected: "https://a".to_string(),
            actual: "https://b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "origin mismatch: expected https://a, got https://b"
        );
        assert_eq!(err.kind().to_string(), "origin_mismatch");
    }
}
