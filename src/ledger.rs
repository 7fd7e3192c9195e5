//! Ledger access over JSON-RPC
//!
//! Read-only: verifier contract calls and transaction lookups. Nothing here
//! signs or sends transactions.

use alloy::primitives::{Address, Bytes, FixedBytes, B256, U256, U64};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::sol;
use alloy::transports::RpcError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::crypto::RecoverableSignature;
use crate::domain::{FieldElement, TransactionRecord};
use crate::infra::{LedgerClient, LedgerError};

/// Base mainnet public endpoint
pub const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";

sol! {
    #[sol(rpc)]
    interface IZkVerifier {
        function verify(bytes calldata proof, bytes32[] calldata publicInputs) external view returns (bool);
    }
}

/// JSON-RPC error code nodes use for a reverted `eth_call`
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Ledger client configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// Chain fetched transactions must belong to
    pub chain_id: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            chain_id: 8453,
        }
    }
}

/// Transaction fields as returned by `eth_getTransactionByHash`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: B256,
    from: Address,
    to: Option<Address>,
    input: Bytes,
    r: U256,
    s: U256,
    v: U64,
    #[serde(default)]
    chain_id: Option<U64>,
}

impl RpcTransaction {
    /// Chain the transaction was signed for; `None` for pre-EIP-155 legacy
    fn signed_chain_id(&self) -> Option<u64> {
        let v = self.v.to::<u64>();
        self.chain_id
            .map(|id| id.to::<u64>())
            .or_else(|| (v >= 35).then(|| (v - 35) / 2))
    }

    fn into_record(self, expected_chain: u64) -> Result<TransactionRecord, LedgerError> {
        if let Some(chain) = self.signed_chain_id() {
            if chain != expected_chain {
                return Err(LedgerError::Malformed(format!(
                    "transaction {} is for chain {}, expected {}",
                    self.hash, chain, expected_chain
                )));
            }
        }

        // quantities drop leading zeros on the wire
        let r = self.r.to_be_bytes::<32>();
        let s = self.s.to_be_bytes::<32>();
        let signature = RecoverableSignature::from_parts(&r, &s, self.v.to::<u64>())
            .map_err(|e| LedgerError::Malformed(format!("transaction signature: {}", e)))?;

        Ok(TransactionRecord {
            hash: self.hash,
            from: self.from,
            to: self.to,
            input_data: self.input.to_vec(),
            signature,
        })
    }
}

/// [`LedgerClient`] backed by an alloy HTTP provider
pub struct AlloyLedgerClient {
    config: LedgerConfig,
}

impl AlloyLedgerClient {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }

    pub fn rpc_url(&self) -> &str {
        &self.config.rpc_url
    }

    fn to_bytes32(input: &FieldElement) -> FixedBytes<32> {
        FixedBytes::from(input.0)
    }
}

/// Only a genuine revert means the verifier rejected the proof; any other
/// node error says nothing about it
fn classify_call_error(err: alloy::contract::Error) -> LedgerError {
    match err {
        alloy::contract::Error::TransportError(RpcError::ErrorResp(payload)) => {
            let reverted = payload.code == EXECUTION_REVERTED_CODE
                || payload.as_revert_data().is_some()
                || payload.message.starts_with("execution reverted");
            if reverted {
                LedgerError::Reverted(payload.message.to_string())
            } else {
                LedgerError::Unavailable(format!("{} (code {})", payload.message, payload.code))
            }
        }
        alloy::contract::Error::TransportError(e) => LedgerError::Unavailable(e.to_string()),
        other => LedgerError::Malformed(other.to_string()),
    }
}

#[async_trait]
impl LedgerClient for AlloyLedgerClient {
    async fn call_verifier(
        &self,
        contract: Address,
        proof: Bytes,
        public_inputs: Vec<FieldElement>,
    ) -> Result<bool, LedgerError> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| LedgerError::Unavailable(format!("Invalid RPC URL: {}", e)))?,
        );

        let contract_instance = IZkVerifier::new(contract, &provider);
        let inputs: Vec<FixedBytes<32>> = public_inputs.iter().map(Self::to_bytes32).collect();

        debug!(%contract, inputs = inputs.len(), "eth_call verify");
        let result = contract_instance
            .verify(proof, inputs)
            .call()
            .await
            .map_err(classify_call_error)?;

        info!(%contract, valid = result._0, "Verifier contract answered");
        Ok(result._0)
    }

    async fn transaction(&self, tx_id: B256) -> Result<TransactionRecord, LedgerError> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| LedgerError::Unavailable(format!("Invalid RPC URL: {}", e)))?,
        );

        let tx: Option<RpcTransaction> = provider
            .raw_request("eth_getTransactionByHash".into(), (tx_id,))
            .await
            .map_err(|e| match e {
                RpcError::ErrorResp(payload) => LedgerError::Malformed(payload.message.to_string()),
                RpcError::DeserError { err, .. } => LedgerError::Malformed(err.to_string()),
                other => LedgerError::Unavailable(other.to_string()),
            })?;

        let tx = tx.ok_or(LedgerError::NotFound(tx_id))?;
        debug!(tx = %tx_id, input_len = tx.input.len(), "Fetched transaction");
        tx.into_record(self.config.chain_id)
    }
}
