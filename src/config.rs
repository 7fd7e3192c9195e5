//! Runtime configuration
//!
//! Every setting has a default matching the deployed Base mainnet system and
//! can be overridden through the environment.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{address, b256, Address, B256};
use reqwest::Url;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::crypto::PublicKeyPoint;
use crate::handshake::{
    ChallengeTransport, HandshakeConfig, DEFAULT_RESEND_INTERVAL, DEFAULT_RESPONSE_TIMEOUT,
};
use crate::infra::{FreshnessWindow, LedgerClient, MetadataValidator, NonceRegistry, ProofSystem};
use crate::ledger::LedgerConfig;
use crate::portal::AttestationSource;
use crate::registry::DEFAULT_REGISTRY_URL;
use crate::verifier::{
    CircuitRef, ProofVerifier, PublicInputLayout, ReferenceCheck, SignatureBinding,
    VerificationMode,
};

/// Coinbase attester contract on Base
pub const COINBASE_ATTESTER: Address = address!("357458739F90461b99789350868CD7CF330Dd7EE");

/// EAS schema of the "verified account" attestation
pub const VERIFIED_ACCOUNT_SCHEMA: B256 =
    b256!("f8b05c79f090979bf4a80270aba232dff11a10d9ca55c4f88de95317970f0de9");

/// Attester public key checked by legacy circuits
pub const COINBASE_PUBKEY: PublicKeyPoint = PublicKeyPoint {
    x: [
        110, 2, 155, 136, 43, 202, 15, 113, 253, 226, 124, 73, 244, 53, 240, 157, 69, 141, 81,
        241, 61, 245, 141, 63, 184, 147, 52, 148, 64, 19, 199, 198,
    ],
    y: [
        39, 57, 45, 60, 108, 85, 171, 1, 112, 223, 37, 76, 109, 91, 178, 131, 212, 100, 46, 216,
        65, 17, 184, 195, 43, 158, 154, 14, 0, 147, 58, 140,
    ],
};

pub const DEFAULT_PORTAL_URL: &str = "https://silly-taiyaki-c12567.netlify.app/";

pub const DEFAULT_CIRCUIT_URL: &str = "https://raw.githubusercontent.com/hsy822/zk-coinbase-attestor/main/packages/circuit/target/zk_coinbase_attestor.json";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

/// How proofs are verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationSettings {
    Offline { circuit_url: String },
    Onchain { verifier_contract: Address },
}

#[derive(Debug, Clone)]
pub struct AttestorConfig {
    pub requester_origin: String,
    pub portal_url: Url,
    pub portal_origin: String,
    pub response_timeout: Duration,
    pub transport: ChallengeTransport,
    pub freshness: FreshnessWindow,
    pub nonce_sweep_interval: Duration,
    pub verification: VerificationSettings,
    pub reference: ReferenceCheck,
    pub layout: PublicInputLayout,
    pub binding: Option<SignatureBinding>,
    pub registry_url: String,
    pub attester: Address,
    pub schema_id: B256,
    pub ledger: LedgerConfig,
}

impl AttestorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let requester_origin =
            get("ATTESTOR_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        let portal_url = get("PROOF_PORTAL_URL").unwrap_or_else(|| DEFAULT_PORTAL_URL.to_string());
        let portal_url = Url::parse(&portal_url).map_err(|e| invalid("PROOF_PORTAL_URL", e))?;
        let portal_origin = get("PROOF_PORTAL_ORIGIN")
            .unwrap_or_else(|| portal_url.origin().ascii_serialization());

        let response_timeout = match get("HANDSHAKE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(v.parse().map_err(|e| invalid("HANDSHAKE_TIMEOUT_SECS", e))?),
            None => DEFAULT_RESPONSE_TIMEOUT,
        };

        let resend = match get("HANDSHAKE_RESEND_MS") {
            Some(v) => Duration::from_millis(v.parse().map_err(|e| invalid("HANDSHAKE_RESEND_MS", e))?),
            None => DEFAULT_RESEND_INTERVAL,
        };
        let transport = match get("CHALLENGE_TRANSPORT").as_deref().unwrap_or("url") {
            "url" => ChallengeTransport::UrlParameters,
            "message" => ChallengeTransport::HandshakeMessage { interval: resend },
            other => return Err(invalid("CHALLENGE_TRANSPORT", format!("unknown transport {}", other))),
        };

        let defaults = FreshnessWindow::default();
        let freshness = FreshnessWindow {
            max_skew_secs: parse_or(&get, "MAX_CLOCK_SKEW_SECS", defaults.max_skew_secs)?,
            max_age_secs: parse_or(&get, "MAX_CHALLENGE_AGE_SECS", defaults.max_age_secs)?,
        };
        let nonce_sweep_interval =
            Duration::from_secs(parse_or(&get, "NONCE_SWEEP_INTERVAL_SECS", 60u64)?);

        let verification = match get("VERIFICATION_MODE").as_deref().unwrap_or("offline") {
            "offline" => VerificationSettings::Offline {
                circuit_url: get("CIRCUIT_URL").unwrap_or_else(|| DEFAULT_CIRCUIT_URL.to_string()),
            },
            "onchain" => VerificationSettings::Onchain {
                verifier_contract: get("VERIFIER_CONTRACT")
                    .ok_or(ConfigError::Missing("VERIFIER_CONTRACT"))?
                    .parse()
                    .map_err(|e| invalid("VERIFIER_CONTRACT", e))?,
            },
            other => return Err(invalid("VERIFICATION_MODE", format!("unknown mode {}", other))),
        };

        let attester = match get("ATTESTER_CONTRACT") {
            Some(v) => v.parse().map_err(|e| invalid("ATTESTER_CONTRACT", e))?,
            None => COINBASE_ATTESTER,
        };

        let reference = match get("REFERENCE_CHECK").as_deref().unwrap_or("contract") {
            "contract" => ReferenceCheck::ContractAddress(attester),
            "pubkey" => ReferenceCheck::Pubkey(match get("ATTESTER_PUBKEY") {
                Some(v) => parse_pubkey(&v)?,
                None => COINBASE_PUBKEY,
            }),
            other => return Err(invalid("REFERENCE_CHECK", format!("unknown check {}", other))),
        };

        let default_layout = PublicInputLayout::default();
        let layout = PublicInputLayout {
            contract_address_offset: parse_or(
                &get,
                "PUBLIC_INPUT_CONTRACT_OFFSET",
                default_layout.contract_address_offset,
            )?,
            pubkey_x_offset: parse_or(&get, "PUBLIC_INPUT_PUBKEY_X_OFFSET", default_layout.pubkey_x_offset)?,
            pubkey_y_offset: parse_or(&get, "PUBLIC_INPUT_PUBKEY_Y_OFFSET", default_layout.pubkey_y_offset)?,
        };

        let binding = get("SIGNATURE_BINDING_OFFSETS")
            .map(|v| parse_binding(&v))
            .transpose()?;

        let schema_id = match get("EAS_SCHEMA_ID") {
            Some(v) => v.parse().map_err(|e| invalid("EAS_SCHEMA_ID", e))?,
            None => VERIFIED_ACCOUNT_SCHEMA,
        };

        let ledger_defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            rpc_url: get("LEDGER_RPC_URL").unwrap_or(ledger_defaults.rpc_url),
            chain_id: parse_or(&get, "LEDGER_CHAIN_ID", ledger_defaults.chain_id)?,
        };

        Ok(Self {
            requester_origin,
            portal_url,
            portal_origin,
            response_timeout,
            transport,
            freshness,
            nonce_sweep_interval,
            verification,
            reference,
            layout,
            binding,
            registry_url: get("EAS_GRAPHQL_URL").unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
            attester,
            schema_id,
            ledger,
        })
    }

    pub fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig::new(self.requester_origin.clone(), self.portal_url.clone())
            .with_portal_origin(self.portal_origin.clone())
            .with_timeout(self.response_timeout)
            .with_transport(self.transport)
    }

    pub fn attestation_source(&self) -> AttestationSource {
        AttestationSource {
            attester: self.attester,
            schema_id: self.schema_id,
        }
    }

    /// Metadata validator over a fresh nonce registry whose expired entries
    /// are swept until `shutdown` flips
    pub fn metadata_validator(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> (Arc<MetadataValidator>, JoinHandle<()>) {
        let nonces = Arc::new(NonceRegistry::new(self.freshness.retention()));
        let sweeper = nonces.spawn_sweeper(self.nonce_sweep_interval, shutdown);
        (
            Arc::new(MetadataValidator::new(self.freshness, nonces)),
            sweeper,
        )
    }

    /// Assemble the proof verifier for the configured mode.
    ///
    /// Offline mode needs a proving backend.
    pub fn build_verifier(
        &self,
        proof_system: Option<Arc<dyn ProofSystem>>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Result<ProofVerifier, ConfigError> {
        let mode = match &self.verification {
            VerificationSettings::Offline { circuit_url } => VerificationMode::Offline {
                circuit: CircuitRef::remote(circuit_url).map_err(|e| invalid("CIRCUIT_URL", e))?,
                proof_system: proof_system.ok_or(ConfigError::Missing("proving backend"))?,
            },
            VerificationSettings::Onchain { verifier_contract } => VerificationMode::Onchain {
                verifier_contract: *verifier_contract,
                ledger,
            },
        };

        let mut verifier = ProofVerifier::new(mode, self.reference).with_layout(self.layout);
        if let Some(binding) = self.binding {
            verifier = verifier.with_signature_binding(binding);
        }
        Ok(verifier)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => v.trim().parse().map_err(|e| invalid(key, e)),
        None => Ok(default),
    }
}

/// `x || y` (64 bytes) or `04 || x || y` (65 bytes), hex
fn parse_pubkey(value: &str) -> Result<PublicKeyPoint, ConfigError> {
    let bytes = hex::decode(value.trim().trim_start_matches("0x"))
        .map_err(|e| invalid("ATTESTER_PUBKEY", e))?;
    let coords = match bytes.len() {
        64 => &bytes[..],
        65 if bytes[0] == 0x04 => &bytes[1..],
        n => return Err(invalid("ATTESTER_PUBKEY", format!("expected 64 or 65 bytes, got {}", n))),
    };
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(&coords[..32]);
    y.copy_from_slice(&coords[32..]);
    Ok(PublicKeyPoint { x, y })
}

/// `digest,signature,pubkey_x,pubkey_y` offsets
fn parse_binding(value: &str) -> Result<SignatureBinding, ConfigError> {
    let offsets = value
        .split(',')
        .map(|part| part.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid("SIGNATURE_BINDING_OFFSETS", e))?;
    match offsets.as_slice() {
        [digest, signature, x, y] => Ok(SignatureBinding {
            digest_offset: *digest,
            signature_offset: *signature,
            pubkey_x_offset: *x,
            pubkey_y_offset: *y,
        }),
        _ => Err(invalid(
            "SIGNATURE_BINDING_OFFSETS",
            "expected four comma-separated offsets",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AttestorConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AttestorConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[tokio::test]
    async fn test_metadata_validator_uses_freshness_and_sweeper() {
        let config = load(&[
            ("MAX_CHALLENGE_AGE_SECS", "60"),
            ("NONCE_SWEEP_INTERVAL_SECS", "5"),
        ])
        .unwrap();
        let (tx, rx) = watch::channel(false);

        let (validator, sweeper) = config.metadata_validator(rx);
        assert_eq!(validator.window().max_age_secs, 60);
        assert_eq!(validator.nonces().retention(), Duration::from_secs(70));

        tx.send(true).unwrap();
        sweeper.await.unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.response_timeout, Duration::from_secs(120));
        assert_eq!(config.portal_origin, "https://silly-taiyaki-c12567.netlify.app");
        assert_eq!(config.transport, ChallengeTransport::UrlParameters);
        assert_eq!(config.freshness, FreshnessWindow::default());
        assert_eq!(config.reference, ReferenceCheck::ContractAddress(COINBASE_ATTESTER));
        assert_eq!(config.schema_id, VERIFIED_ACCOUNT_SCHEMA);
        assert!(matches!(config.verification, VerificationSettings::Offline { .. }));
        assert!(config.binding.is_none());
    }

    #[test]
    fn test_message_transport() {
        let config = load(&[
            ("CHALLENGE_TRANSPORT", "message"),
            ("HANDSHAKE_RESEND_MS", "250"),
        ])
        .unwrap();
        assert_eq!(
            config.transport,
            ChallengeTransport::HandshakeMessage {
                interval: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn test_onchain_requires_contract() {
        let err = load(&[("VERIFICATION_MODE", "onchain")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("VERIFIER_CONTRACT"));

        let config = load(&[
            ("VERIFICATION_MODE", "onchain"),
            ("VERIFIER_CONTRACT", "0x0000000000000000000000000000000000000099"),
        ])
        .unwrap();
        assert_eq!(
            config.verification,
            VerificationSettings::Onchain {
                verifier_contract: Address::with_last_byte(0x99)
            }
        );
    }

    #[test]
    fn test_pubkey_reference() {
        let config = load(&[("REFERENCE_CHECK", "pubkey")]).unwrap();
        assert_eq!(config.reference, ReferenceCheck::Pubkey(COINBASE_PUBKEY));

        let hex_key = format!("04{}{}", "11".repeat(32), "22".repeat(32));
        let config = load(&[("REFERENCE_CHECK", "pubkey"), ("ATTESTER_PUBKEY", &hex_key)]).unwrap();
        assert_eq!(
            config.reference,
            ReferenceCheck::Pubkey(PublicKeyPoint {
                x: [0x11; 32],
                y: [0x22; 32]
            })
        );
    }

    #[test]
    fn test_binding_offsets() {
        let config = load(&[("SIGNATURE_BINDING_OFFSETS", "20, 52, 117, 149")]).unwrap();
        assert_eq!(
            config.binding,
            Some(SignatureBinding {
                digest_offset: 20,
                signature_offset: 52,
                pubkey_x_offset: 117,
                pubkey_y_offset: 149,
            })
        );
        assert!(load(&[("SIGNATURE_BINDING_OFFSETS", "1,2,3")]).is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("HANDSHAKE_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { key: "HANDSHAKE_TIMEOUT_SECS", .. })
        ));
        assert!(load(&[("CHALLENGE_TRANSPORT", "carrier-pigeon")]).is_err());
        assert!(load(&[("PROOF_PORTAL_URL", "::")]).is_err());
        assert!(matches!(
            load(&[("LEDGER_CHAIN_ID", "base")]),
            Err(ConfigError::Invalid { key: "LEDGER_CHAIN_ID", .. })
        ));
    }

    #[test]
    fn test_ledger_settings() {
        assert_eq!(load(&[]).unwrap().ledger.chain_id, 8453);

        let config = load(&[
            ("LEDGER_RPC_URL", "http://127.0.0.1:8545"),
            ("LEDGER_CHAIN_ID", "84532"),
        ])
        .unwrap();
        assert_eq!(config.ledger.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.ledger.chain_id, 84532);
    }

    #[test]
    fn test_handshake_config() {
        let config = load(&[("HANDSHAKE_TIMEOUT_SECS", "30")]).unwrap();
        let handshake = config.handshake_config();
        assert_eq!(handshake.timeout, Duration::from_secs(30));
        assert_eq!(handshake.portal_origin, config.portal_origin);
    }
}
