//! Attestation registry client (EAS GraphQL indexer)

use std::time::Duration;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::{select_latest, AttestationQuery, AttestationRecord};
use crate::infra::{AttestationRegistry, RegistryError};

/// Base mainnet EAS indexer
pub const DEFAULT_REGISTRY_URL: &str = "https://base.easscan.org/graphql";

const LATEST_ATTESTATION_QUERY: &str = r#"query GetAttestations($recipient: String!, $attester: String!, $schemaId: String!, $now: Int!) {
  attestations(
    where: {
      recipient: { equals: $recipient }
      schemaId: { equals: $schemaId }
      attester: { equals: $attester }
      revocationTime: { equals: 0 }
      OR: [
        { expirationTime: { equals: 0 } }
        { expirationTime: { gt: $now } }
      ]
    }
    orderBy: { time: desc }
    take: 1
  ) {
    txid
    attester
    recipient
    schemaId
    revocationTime
    expirationTime
    time
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<AttestationsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AttestationsData {
    attestations: Vec<RawAttestation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttestation {
    txid: B256,
    attester: Address,
    recipient: Address,
    schema_id: B256,
    revocation_time: u64,
    expiration_time: u64,
    time: u64,
}

impl From<RawAttestation> for AttestationRecord {
    fn from(raw: RawAttestation) -> Self {
        Self {
            transaction_id: raw.txid,
            attester: raw.attester,
            recipient: raw.recipient,
            schema_id: raw.schema_id,
            revocation_time: raw.revocation_time,
            expiration_time: raw.expiration_time,
            issued_at: raw.time,
        }
    }
}

/// [`AttestationRegistry`] over an EAS GraphQL endpoint
pub struct EasGraphqlRegistry {
    client: Client,
    endpoint: String,
}

impl EasGraphqlRegistry {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Request(e.to_string()))?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AttestationRegistry for EasGraphqlRegistry {
    async fn latest_attestation(
        &self,
        query: AttestationQuery,
    ) -> Result<Option<AttestationRecord>, RegistryError> {
        let body = json!({
            "query": LATEST_ATTESTATION_QUERY,
            "variables": {
                "recipient": query.recipient.to_checksum(None),
                "attester": query.attester.to_checksum(None),
                "schemaId": query.schema_id.to_string(),
                "now": query.now,
            }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RegistryError::Request(e.to_string()))?;

        let parsed: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Malformed(e.to_string()))?;

        if let Some(first) = parsed.errors.first() {
            return Err(RegistryError::Query(first.message.clone()));
        }
        let data = parsed
            .data
            .ok_or_else(|| RegistryError::Malformed("response has no data".to_string()))?;

        debug!(
            recipient = %query.recipient,
            returned = data.attestations.len(),
            "Registry answered"
        );

        // the endpoint's filtering is not trusted
        let selected = select_latest(
            data.attestations
                .into_iter()
                .map(AttestationRecord::from)
                .filter(|r| {
                    r.recipient == query.recipient
                        && r.attester == query.attester
                        && r.schema_id == query.schema_id
                }),
            query.now,
        );
        Ok(selected)
    }
}
