//! Response metadata validation
//!
//! Gates an untrusted response before any cryptographic work: origin,
//! freshness, then single use. Checks run in that order and stop at the first
//! failure.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::error::{Result, VerificationError};
use super::nonce_registry::NonceRegistry;
use crate::domain::Challenge;

/// Accepted age range of a response timestamp, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow {
    /// How far in the future a timestamp may be (clock skew)
    pub max_skew_secs: i64,
    /// How old a timestamp may be
    pub max_age_secs: i64,
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self {
            max_skew_secs: 10,
            max_age_secs: 300,
        }
    }
}

impl FreshnessWindow {
    pub fn contains(&self, age_secs: i64) -> bool {
        age_secs >= -self.max_skew_secs && age_secs <= self.max_age_secs
    }

    /// Minimum time a consumed nonce must be retained
    pub fn retention(&self) -> Duration {
        Duration::from_secs((self.max_age_secs + self.max_skew_secs).max(0) as u64)
    }
}

/// Checks freshness, origin and replay of a response's metadata
pub struct MetadataValidator {
    window: FreshnessWindow,
    nonces: Arc<NonceRegistry>,
}

impl MetadataValidator {
    pub fn new(window: FreshnessWindow, nonces: Arc<NonceRegistry>) -> Self {
        Self { window, nonces }
    }

    pub fn window(&self) -> FreshnessWindow {
        self.window
    }

    pub fn nonces(&self) -> &Arc<NonceRegistry> {
        &self.nonces
    }

    /// Validate against the current wall clock
    pub async fn validate(&self, meta: &Challenge, expected_origin: &str) -> Result<()> {
        self.validate_at(meta, expected_origin, chrono::Utc::now().timestamp())
            .await
    }

    /// Validate against an explicit clock reading (unix seconds)
    pub async fn validate_at(&self, meta: &Challenge, expected_origin: &str, now: i64) -> Result<()> {
        if meta.origin != expected_origin {
            warn!(
                expected = expected_origin,
                actual = %meta.origin,
                "Rejected response from unexpected origin"
            );
            return Err(VerificationError::OriginMismatch {
                expected: expected_origin.to_string(),
                actual: meta.origin.clone(),
            });
        }

        let age_secs = now.saturating_sub(meta.issued_at);
        if !self.window.contains(age_secs) {
            warn!(age_secs, nonce = %meta.nonce, "Rejected stale or future-dated response");
            return Err(VerificationError::TimestampOutOfRange { age_secs });
        }

        if !self.nonces.record(&meta.nonce).await {
            warn!(nonce = %meta.nonce, "Replay detected");
            return Err(VerificationError::ReplayDetected {
                nonce: meta.nonce.to_string(),
            });
        }

        Ok(())
    }
}
