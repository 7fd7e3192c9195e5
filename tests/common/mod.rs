//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Bytes, B256};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use reqwest::Url;
use serde_json::{json, Value};

use zk_attestor::crypto::RecoverableSignature;
use zk_attestor::domain::{
    AttestationQuery, AttestationRecord, Challenge, CircuitArtifact, CircuitInputs, FieldElement,
    GeneratedProof, ProofEnvelope, TransactionRecord, PROOF_RESULT_TYPE,
};
use zk_attestor::handshake::{
    HandshakeConfig, HandshakeCoordinator, InProcessPortalLauncher, InboundMessage, LaunchError,
    LaunchRequest, MessageHub, PortalLauncher, PortalWindow,
};
use zk_attestor::infra::{
    AttestationRegistry, FreshnessWindow, LedgerClient, LedgerError, MetadataValidator,
    NonceRegistry, ProofSystem, ProofSystemError, RegistryError, WalletSigner,
};
use zk_attestor::portal::{AttestationSource, LocalWalletSigner, ProofPortal};
use zk_attestor::verifier::{
    bytes_to_inputs, CircuitRef, ProofVerifier, ReferenceCheck, SignatureBinding,
    VerificationMode,
};

pub const REQUESTER_ORIGIN: &str = "https://app.test";
pub const PORTAL_URL: &str = "https://portal.test/prove";
pub const PORTAL_ORIGIN: &str = "https://portal.test";

pub const ATTESTER: Address = Address::repeat_byte(0x35);
pub const SCHEMA_ID: B256 = B256::repeat_byte(0xf8);
pub const ATTESTATION_TX: B256 = B256::repeat_byte(0xab);
pub const VERIFIER_CONTRACT: Address = Address::repeat_byte(0x99);

/// Where the fake circuit exposes its values
pub const BINDING: SignatureBinding = SignatureBinding {
    digest_offset: 20,
    signature_offset: 52,
    pubkey_x_offset: 117,
    pubkey_y_offset: 149,
};

/// Total public inputs the fake circuit exposes
pub const PUBLIC_INPUT_COUNT: usize = 181;

/// Deterministic user key
pub fn user_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32].into()).unwrap()
}

/// Selector plus two words, like an attest() call
pub fn attest_calldata() -> Vec<u8> {
    let mut data = vec![0xf1, 0x7d, 0xf2, 0x5a];
    data.extend_from_slice(&[0x11; 32]);
    data.extend_from_slice(&[0x22; 32]);
    data
}

pub fn inline_circuit() -> CircuitRef {
    CircuitRef::Inline(Arc::new(CircuitArtifact {
        bytecode: "H4sIAAAAAAAA/w==".into(),
        abi: json!({ "parameters": [] }),
        noir_version: Some("1.0.0-beta.3".into()),
        hash: None,
    }))
}

fn inputs_digest(public_inputs: &[FieldElement]) -> B256 {
    let mut buf = Vec::with_capacity(public_inputs.len() * 32);
    for input in public_inputs {
        buf.extend_from_slice(&input.0);
    }
    keccak256(buf)
}

/// Stand-in proving backend.
///
/// A "proof" is the hash of the public inputs, so any change to the inputs
/// invalidates it.
#[derive(Default)]
pub struct FakeProofSystem {
    proved: Mutex<Vec<CircuitInputs>>,
    verify_calls: AtomicUsize,
}

impl FakeProofSystem {
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn last_inputs(&self) -> Option<CircuitInputs> {
        self.proved.lock().unwrap().last().cloned()
    }

    pub fn check(proof: &[u8], public_inputs: &[FieldElement]) -> bool {
        proof == inputs_digest(public_inputs).as_slice()
    }
}

impl ProofSystem for FakeProofSystem {
    fn verify(
        &self,
        _circuit: &CircuitArtifact,
        proof: &[u8],
        public_inputs: &[FieldElement],
    ) -> Result<bool, ProofSystemError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::check(proof, public_inputs))
    }

    fn prove(
        &self,
        _circuit: &CircuitArtifact,
        inputs: &CircuitInputs,
    ) -> Result<GeneratedProof, ProofSystemError> {
        let signature = inputs
            .user_signature
            .to_bytes()
            .map_err(|e| ProofSystemError::Witness(e.to_string()))?;

        let mut exposed = inputs.contract_address.to_vec();
        exposed.extend_from_slice(inputs.digest.as_slice());
        exposed.extend_from_slice(&signature);
        exposed.extend_from_slice(&inputs.user_pubkey.x);
        exposed.extend_from_slice(&inputs.user_pubkey.y);

        let public_inputs = bytes_to_inputs(&exposed);
        self.proved.lock().unwrap().push(inputs.clone());
        Ok(GeneratedProof {
            proof: inputs_digest(&public_inputs).to_vec(),
            public_inputs,
        })
    }
}

/// Ledger holding a fixed set of transactions and a fake verifier contract
#[derive(Default)]
pub struct FakeLedger {
    transactions: HashMap<B256, TransactionRecord>,
    verifier_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl FakeLedger {
    pub fn with_transaction(input_data: Vec<u8>) -> Self {
        let mut transactions = HashMap::new();
        transactions.insert(
            ATTESTATION_TX,
            TransactionRecord {
                hash: ATTESTATION_TX,
                from: Address::repeat_byte(0x01),
                to: Some(ATTESTER),
                input_data,
                signature: RecoverableSignature::from_parts(&[1u8; 32], &[2u8; 32], 27).unwrap(),
            },
        );
        Self {
            transactions,
            ..Default::default()
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn verifier_calls(&self) -> usize {
        self.verifier_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn call_verifier(
        &self,
        contract: Address,
        proof: Bytes,
        public_inputs: Vec<FieldElement>,
    ) -> Result<bool, LedgerError> {
        self.verifier_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("connection refused".into()));
        }
        if contract != VERIFIER_CONTRACT {
            return Err(LedgerError::Reverted("no code at address".into()));
        }
        Ok(FakeProofSystem::check(&proof, &public_inputs))
    }

    async fn transaction(&self, tx_id: B256) -> Result<TransactionRecord, LedgerError> {
        self.transactions
            .get(&tx_id)
            .cloned()
            .ok_or(LedgerError::NotFound(tx_id))
    }
}

/// Registry with one attestation for one recipient
pub struct FakeRegistry {
    record: AttestationRecord,
}

impl FakeRegistry {
    pub fn for_recipient(recipient: Address) -> Self {
        Self {
            record: AttestationRecord {
                transaction_id: ATTESTATION_TX,
                attester: ATTESTER,
                recipient,
                schema_id: SCHEMA_ID,
                revocation_time: 0,
                expiration_time: 0,
                issued_at: 1_700_000_000,
            },
        }
    }
}

#[async_trait]
impl AttestationRegistry for FakeRegistry {
    async fn latest_attestation(
        &self,
        query: AttestationQuery,
    ) -> Result<Option<AttestationRecord>, RegistryError> {
        let matches = query.recipient == self.record.recipient
            && query.attester == self.record.attester
            && query.schema_id == self.record.schema_id
            && self.record.is_active(query.now);
        Ok(matches.then(|| self.record.clone()))
    }
}

/// Window that does nothing
#[derive(Default)]
pub struct NoopWindow {
    closed: AtomicBool,
}

impl PortalWindow for NoopWindow {
    fn post_message(&self, _message: Value) {}

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Launcher refused by the host
pub struct BlockedLauncher;

#[async_trait]
impl PortalLauncher for BlockedLauncher {
    async fn launch(&self, _request: LaunchRequest) -> Result<Box<dyn PortalWindow>, LaunchError> {
        Err(LaunchError::Blocked("popup blocked".into()))
    }
}

type Script = dyn Fn(&Challenge) -> Vec<InboundMessage> + Send + Sync;

/// Launcher that delivers scripted messages after `delay`, optionally
/// followed by the portal's real answer.
pub struct ScriptedLauncher {
    hub: Arc<MessageHub>,
    script: Arc<Script>,
    delay: Duration,
    portal: Option<Arc<ProofPortal>>,
    attempted: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    pub fn new<F>(hub: Arc<MessageHub>, script: F) -> Self
    where
        F: Fn(&Challenge) -> Vec<InboundMessage> + Send + Sync + 'static,
    {
        Self {
            hub,
            script: Arc::new(script),
            delay: Duration::ZERO,
            portal: None,
            attempted: Arc::new(AtomicUsize::new(0)),
            delivered: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Never posts anything
    pub fn silent(hub: Arc<MessageHub>) -> Self {
        Self::new(hub, |_| Vec::new())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Follow the script with the portal's answer to the challenge
    pub fn then_respond(mut self, portal: Arc<ProofPortal>) -> Self {
        self.portal = Some(portal);
        self
    }

    /// Messages the launcher tried to deliver
    pub fn attempted(&self) -> usize {
        self.attempted.load(Ordering::SeqCst)
    }

    /// Subscriber deliveries that actually happened
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortalLauncher for ScriptedLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<Box<dyn PortalWindow>, LaunchError> {
        let messages = (self.script)(&request.challenge);
        let hub = Arc::clone(&self.hub);
        let delay = self.delay;
        let portal = self.portal.clone();
        let attempted = Arc::clone(&self.attempted);
        let delivered = Arc::clone(&self.delivered);
        let challenge = request.challenge;

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            for message in messages {
                attempted.fetch_add(1, Ordering::SeqCst);
                delivered.fetch_add(hub.deliver(message), Ordering::SeqCst);
            }
            if let Some(portal) = portal {
                let envelope = portal
                    .generate(&challenge.origin, &challenge.nonce)
                    .await
                    .unwrap();
                attempted.fetch_add(1, Ordering::SeqCst);
                delivered.fetch_add(
                    hub.deliver(InboundMessage::new(PORTAL_ORIGIN, envelope.to_message())),
                    Ordering::SeqCst,
                );
            }
        });

        Ok(Box::new(NoopWindow::default()))
    }
}

/// `proof-result` message for `meta` carrying `generated`
pub fn proof_result(meta: &Challenge, generated: &GeneratedProof) -> Value {
    ProofEnvelope {
        proof: generated.proof.clone(),
        public_inputs: generated.public_inputs.clone(),
        meta: meta.clone(),
    }
    .to_message()
}

/// Schema-valid `proof-result` whose proof is garbage
pub fn bogus_proof_result(meta: &Challenge) -> Value {
    json!({
        "type": PROOF_RESULT_TYPE,
        "proof": "0x0badc0de",
        "publicInputs": [],
        "meta": meta,
    })
}

/// Everything on both sides of the handshake, wired with fakes
pub struct Harness {
    pub hub: Arc<MessageHub>,
    pub nonces: Arc<NonceRegistry>,
    pub metadata: Arc<MetadataValidator>,
    pub proof_system: Arc<FakeProofSystem>,
    pub ledger: Arc<FakeLedger>,
    pub portal: Arc<ProofPortal>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_calldata(attest_calldata())
    }

    pub fn with_calldata(calldata: Vec<u8>) -> Self {
        let wallet = LocalWalletSigner::new(user_key());
        let registry = Arc::new(FakeRegistry::for_recipient(wallet.address()));
        let ledger = Arc::new(FakeLedger::with_transaction(calldata));
        let proof_system = Arc::new(FakeProofSystem::default());

        let portal = Arc::new(ProofPortal::new(
            Arc::new(wallet),
            registry,
            ledger.clone(),
            proof_system.clone(),
            inline_circuit(),
            AttestationSource {
                attester: ATTESTER,
                schema_id: SCHEMA_ID,
            },
        ));

        let window = FreshnessWindow::default();
        let nonces = Arc::new(NonceRegistry::new(window.retention()));
        let metadata = Arc::new(MetadataValidator::new(window, nonces.clone()));

        Self {
            hub: MessageHub::new(),
            nonces,
            metadata,
            proof_system,
            ledger,
            portal,
        }
    }

    pub fn config(&self) -> HandshakeConfig {
        HandshakeConfig::new(REQUESTER_ORIGIN, Url::parse(PORTAL_URL).unwrap())
            .with_timeout(Duration::from_secs(10))
    }

    pub fn offline_verifier(&self) -> Arc<ProofVerifier> {
        Arc::new(
            ProofVerifier::new(
                VerificationMode::Offline {
                    circuit: inline_circuit(),
                    proof_system: self.proof_system.clone(),
                },
                ReferenceCheck::ContractAddress(ATTESTER),
            )
            .with_signature_binding(BINDING),
        )
    }

    pub fn onchain_verifier(&self) -> Arc<ProofVerifier> {
        Arc::new(ProofVerifier::new(
            VerificationMode::Onchain {
                verifier_contract: VERIFIER_CONTRACT,
                ledger: self.ledger.clone(),
            },
            ReferenceCheck::ContractAddress(ATTESTER),
        ))
    }

    pub fn in_process_launcher(&self) -> Arc<dyn PortalLauncher> {
        Arc::new(InProcessPortalLauncher::new(
            self.portal.clone(),
            self.hub.clone(),
            PORTAL_ORIGIN,
        ))
    }

    pub fn coordinator(
        &self,
        config: HandshakeConfig,
        launcher: Arc<dyn PortalLauncher>,
    ) -> HandshakeCoordinator {
        HandshakeCoordinator::new(
            config,
            launcher,
            self.hub.clone(),
            self.metadata.clone(),
            self.offline_verifier(),
        )
    }

    /// Proof material for the configured wallet, produced outside any
    /// handshake
    pub async fn proof_material(&self) -> GeneratedProof {
        let inputs = self.portal.prepare_inputs().await.unwrap();
        let artifact = match inline_circuit() {
            CircuitRef::Inline(artifact) => artifact,
            CircuitRef::Remote(_) => unreachable!(),
        };
        self.proof_system.prove(&artifact, &inputs).unwrap()
    }
}
