use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};

use zk_attestor::config::{AttestorConfig, VerificationSettings};
use zk_attestor::crypto::{recover_public_key, CalldataPrefix, RecoverableSignature};
use zk_attestor::domain::{decode_hex, AttestationQuery};
use zk_attestor::handshake::ResponseValidator;
use zk_attestor::infra::{AttestationRegistry, LedgerClient};
use zk_attestor::ledger::AlloyLedgerClient;
use zk_attestor::registry::EasGraphqlRegistry;
use zk_attestor::telemetry::{init_telemetry, TelemetryConfig};
use zk_attestor::{ProofEnvelope, VerificationOutcome};

fn print_help() {
    eprintln!(
        "\
zk-attestor

USAGE:
  zk-attestor <command> [options]

COMMANDS:
  digest                          Recompute the calldata digests
  recover                         Recover a public key from a signature
  attestation                     Look up the latest active attestation
  verify-envelope                 Validate and verify a proof-result message

digest OPTIONS:
  --calldata <hex>                Raw calldata
  --tx <hash>                     Or: fetch calldata from this transaction

recover OPTIONS:
  --digest <hex>                  (required) 32-byte digest
  --signature <hex>               (required) 65-byte r || s || v

attestation OPTIONS:
  --recipient <address>           (required)

verify-envelope OPTIONS:
  --file <path>                   (required) JSON proof-result message, '-' for stdin

Configuration is read from the environment (see AttestorConfig)."
    );
}

fn take_value(args: &mut VecDeque<String>, flag: &str) -> anyhow::Result<String> {
    args.pop_front()
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

fn parse_b256(raw: &str, what: &str) -> anyhow::Result<B256> {
    let bytes = decode_hex(raw).map_err(|e| anyhow::anyhow!("invalid {what}: {e}"))?;
    if bytes.len() != 32 {
        anyhow::bail!("{what} must be 32 bytes, got {}", bytes.len());
    }
    Ok(B256::from_slice(&bytes))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    init_telemetry(&TelemetryConfig::from_env()).map_err(|e| anyhow::anyhow!("{e}"))?;
    let config = AttestorConfig::from_env()?;

    match command.as_str() {
        "digest" => {
            let mut calldata: Option<Vec<u8>> = None;
            let mut tx: Option<B256> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--calldata" => {
                        let raw = take_value(&mut args, "--calldata")?;
                        calldata = Some(
                            decode_hex(&raw).map_err(|e| anyhow::anyhow!("invalid calldata: {e}"))?,
                        );
                    }
                    "--tx" => {
                        let raw = take_value(&mut args, "--tx")?;
                        tx = Some(parse_b256(&raw, "transaction hash")?);
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let input = match (calldata, tx) {
                (Some(calldata), None) => calldata,
                (None, Some(hash)) => {
                    let ledger = AlloyLedgerClient::new(config.ledger.clone());
                    ledger.transaction(hash).await?.input_data
                }
                _ => anyhow::bail!("exactly one of --calldata or --tx is required"),
            };

            let prefix = CalldataPrefix::from_input(&input);
            println!("calldata_prefix: 0x{}", hex::encode(prefix.as_bytes()));
            println!("raw_digest:      {}", prefix.digest());
            println!("signed_digest:   {}", prefix.signed_message_digest());
            Ok(())
        }
        "recover" => {
            let mut digest: Option<B256> = None;
            let mut signature: Option<RecoverableSignature> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--digest" => {
                        let raw = take_value(&mut args, "--digest")?;
                        digest = Some(parse_b256(&raw, "digest")?);
                    }
                    "--signature" => {
                        let raw = take_value(&mut args, "--signature")?;
                        let bytes =
                            decode_hex(&raw).map_err(|e| anyhow::anyhow!("invalid signature: {e}"))?;
                        signature = Some(RecoverableSignature::from_bytes(&bytes)?);
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let digest = digest.ok_or_else(|| anyhow::anyhow!("--digest is required"))?;
            let signature = signature.ok_or_else(|| anyhow::anyhow!("--signature is required"))?;
            let key = recover_public_key(&digest, &signature)?;
            println!("public_key: {}", key.to_hex());
            println!("address:    {}", key.to_address());
            Ok(())
        }
        "attestation" => {
            let mut recipient: Option<Address> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--recipient" => {
                        let raw = take_value(&mut args, "--recipient")?;
                        recipient = Some(raw.parse()?);
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }
            let recipient = recipient.ok_or_else(|| anyhow::anyhow!("--recipient is required"))?;

            let registry = EasGraphqlRegistry::new(&config.registry_url, Duration::from_secs(30))?;
            let record = registry
                .latest_attestation(AttestationQuery {
                    recipient,
                    attester: config.attester,
                    schema_id: config.schema_id,
                    now: chrono::Utc::now().timestamp().max(0) as u64,
                })
                .await?;

            match record {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("no active attestation for {recipient}"),
            }
            Ok(())
        }
        "verify-envelope" => {
            let mut file: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--file" => file = Some(take_value(&mut args, "--file")?),
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }
            let file = file.ok_or_else(|| anyhow::anyhow!("--file is required"))?;
            let raw = if file == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                std::fs::read_to_string(&file)?
            };
            let envelope = ProofEnvelope::from_message(serde_json::from_str(&raw)?)?;

            if matches!(config.verification, VerificationSettings::Offline { .. }) {
                anyhow::bail!("offline verification needs a proving backend; set VERIFICATION_MODE=onchain");
            }

            let ledger: Arc<dyn LedgerClient> =
                Arc::new(AlloyLedgerClient::new(config.ledger.clone()));
            let verifier = Arc::new(config.build_verifier(None, ledger)?);
            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            let (metadata, sweeper) = config.metadata_validator(shutdown_rx);
            let validator =
                ResponseValidator::new(config.requester_origin.clone(), metadata, verifier);

            let outcome = validator.validate(envelope).await;
            let _ = shutdown_tx.send(true);
            sweeper.await?;

            match outcome {
                VerificationOutcome::Success { public_inputs, .. } => {
                    println!("valid ({} public inputs)", public_inputs.len());
                    Ok(())
                }
                VerificationOutcome::Failure { reason } => {
                    anyhow::bail!("{} ({})", reason, reason.kind())
                }
            }
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
