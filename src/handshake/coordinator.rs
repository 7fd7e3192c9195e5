//! Handshake coordinator
//!
//! Drives one proof request end to end: issue a challenge, open the isolated
//! context, wait for the single `proof-result` addressed to this challenge,
//! then validate metadata and verify the proof. Every run ends in exactly one
//! terminal outcome, and the challenge nonce is consumed whichever it is.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use super::hub::{InboundMessage, MessageHub, Subscription};
use super::launcher::{
    challenge_message, challenge_url, ChallengeTransport, LaunchRequest, PortalLauncher,
    PortalWindow,
};
use super::state::{failure_label, HandshakeState, StateTracker};
use super::validation::ResponseValidator;
use crate::domain::{
    Challenge, FieldElement, Nonce, ProofEnvelope, VerificationOutcome, CHALLENGE_ACK_TYPE,
    PROOF_RESULT_TYPE,
};
use crate::infra::{MetadataValidator, Result, VerificationError};
use crate::verifier::ProofVerifier;

/// Default wait for a proof response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default resend interval for handshake-message challenges
pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Origin of the requesting application; challenges carry it and
    /// responses must echo it
    pub requester_origin: String,
    pub portal_url: Url,
    /// Only messages from this origin are considered responses
    pub portal_origin: String,
    pub timeout: Duration,
    pub transport: ChallengeTransport,
}

impl HandshakeConfig {
    pub fn new(requester_origin: impl Into<String>, portal_url: Url) -> Self {
        let portal_origin = portal_url.origin().ascii_serialization();
        Self {
            requester_origin: requester_origin.into(),
            portal_url,
            portal_origin,
            timeout: DEFAULT_RESPONSE_TIMEOUT,
            transport: ChallengeTransport::UrlParameters,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_transport(mut self, transport: ChallengeTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_portal_origin(mut self, origin: impl Into<String>) -> Self {
        self.portal_origin = origin.into();
        self
    }
}

/// Result of one handshake run
#[derive(Debug, Clone)]
pub struct HandshakeReport {
    pub handshake_id: Uuid,
    pub nonce: Nonce,
    pub outcome: VerificationOutcome,
    pub states: Vec<HandshakeState>,
    pub elapsed: Duration,
}

impl HandshakeReport {
    pub fn final_state(&self) -> HandshakeState {
        self.states
            .last()
            .copied()
            .unwrap_or(HandshakeState::Idle)
    }
}

/// What an inbound message means to a waiting handshake
enum Routed {
    Ignore,
    Acknowledged,
    Response(Result<ProofEnvelope>),
}

pub struct HandshakeCoordinator {
    config: HandshakeConfig,
    launcher: Arc<dyn PortalLauncher>,
    hub: Arc<MessageHub>,
    validator: ResponseValidator,
}

impl HandshakeCoordinator {
    pub fn new(
        config: HandshakeConfig,
        launcher: Arc<dyn PortalLauncher>,
        hub: Arc<MessageHub>,
        validator: Arc<MetadataValidator>,
        verifier: Arc<ProofVerifier>,
    ) -> Self {
        let validator =
            ResponseValidator::new(config.requester_origin.clone(), validator, verifier);
        Self {
            config,
            launcher,
            hub,
            validator,
        }
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Request a proof and return only the outcome
    pub async fn request_proof(&self) -> VerificationOutcome {
        self.run_handshake().await.outcome
    }

    /// Run one handshake to its terminal state
    pub async fn run_handshake(&self) -> HandshakeReport {
        let handshake_id = Uuid::new_v4();
        let challenge = Challenge::issue(self.config.requester_origin.clone());
        let nonce = challenge.nonce.clone();
        let started = Instant::now();
        let mut tracker = StateTracker::new();

        let span = info_span!("handshake", %handshake_id, %nonce);
        let result = self
            .drive(&challenge, &mut tracker)
            .instrument(span.clone())
            .await;

        let outcome = span.in_scope(|| match result {
            Ok((proof, public_inputs)) => match tracker.advance(HandshakeState::Succeeded) {
                Ok(()) => {
                    info!("Handshake succeeded");
                    VerificationOutcome::Success {
                        proof,
                        public_inputs,
                    }
                }
                Err(e) => {
                    tracker.fail();
                    VerificationOutcome::failure(e)
                }
            },
            Err(e) => {
                tracker.fail();
                let (kind, security_violation) = failure_label(&e);
                warn!(kind, security_violation, error = %e, "Handshake failed");
                VerificationOutcome::failure(e)
            }
        });

        // a failed handshake never returns its nonce to the pool
        if !outcome.is_success() {
            self.validator.retire(&nonce).await;
        }

        HandshakeReport {
            handshake_id,
            nonce,
            outcome,
            states: tracker.into_visited(),
            elapsed: started.elapsed(),
        }
    }

    async fn drive(
        &self,
        challenge: &Challenge,
        tracker: &mut StateTracker,
    ) -> Result<(Vec<u8>, Vec<FieldElement>)> {
        // subscribe before launch so an immediate response is not missed
        let mut subscription = self.hub.subscribe();

        let url = match self.config.transport {
            ChallengeTransport::UrlParameters => challenge_url(&self.config.portal_url, challenge),
            ChallengeTransport::HandshakeMessage { .. } => self.config.portal_url.clone(),
        };
        let window = self
            .launcher
            .launch(LaunchRequest {
                url,
                challenge: challenge.clone(),
            })
            .await
            .map_err(|e| VerificationError::LaunchBlocked(e.to_string()))?;
        tracker.advance(HandshakeState::Issued)?;

        tracker.advance(HandshakeState::AwaitingResponse)?;
        let received = self
            .await_response(challenge, &mut subscription, window.as_ref())
            .await;
        window.close();
        drop(subscription);

        let envelope = received?;
        tracker.advance(HandshakeState::Received)?;

        tracker.advance(HandshakeState::Validating)?;
        match self.validate_envelope(envelope).await {
            VerificationOutcome::Success {
                proof,
                public_inputs,
            } => Ok((proof, public_inputs)),
            VerificationOutcome::Failure { reason } => Err(reason),
        }
    }

    async fn await_response(
        &self,
        challenge: &Challenge,
        subscription: &mut Subscription,
        window: &dyn PortalWindow,
    ) -> Result<ProofEnvelope> {
        let timeout_at = Instant::now() + self.config.timeout;
        let deadline = tokio::time::sleep_until(timeout_at);
        tokio::pin!(deadline);

        let (mut resend, mut acknowledged) = match self.config.transport {
            ChallengeTransport::HandshakeMessage { interval } => {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                (Some(ticker), false)
            }
            ChallengeTransport::UrlParameters => (None, true),
        };
        let timeout_err = || VerificationError::Timeout {
            waited_secs: self.config.timeout.as_secs(),
        };

        loop {
            tokio::select! {
                _ = &mut deadline => return Err(timeout_err()),
                _ = async {
                    match resend.as_mut() {
                        Some(ticker) => ticker.tick().await,
                        None => std::future::pending().await,
                    }
                }, if !acknowledged => {
                    trace!("Posting challenge message");
                    window.post_message(challenge_message(challenge));
                }
                message = subscription.recv() => {
                    let Some(message) = message else {
                        // no further messages can arrive; the timeout still decides
                        deadline.as_mut().await;
                        return Err(timeout_err());
                    };
                    match self.route(&challenge.nonce, message) {
                        Routed::Ignore => {}
                        Routed::Acknowledged => {
                            debug!("Challenge acknowledged");
                            acknowledged = true;
                            resend = None;
                        }
                        Routed::Response(envelope) => return envelope,
                    }
                }
            }
        }
    }

    /// Decide whether `message` is this handshake's response
    fn route(&self, nonce: &Nonce, message: InboundMessage) -> Routed {
        if message.origin != self.config.portal_origin {
            trace!(origin = %message.origin, "Ignoring message from foreign origin");
            return Routed::Ignore;
        }

        match message.message_type() {
            Some(CHALLENGE_ACK_TYPE) => {
                if message.data.get("nonce").and_then(Value::as_str) == Some(nonce.as_str()) {
                    Routed::Acknowledged
                } else {
                    Routed::Ignore
                }
            }
            Some(PROOF_RESULT_TYPE) => {
                let addressed_to = message
                    .data
                    .get("meta")
                    .and_then(|meta| meta.get("nonce"))
                    .and_then(Value::as_str);
                match addressed_to {
                    Some(other) if other != nonce.as_str() => {
                        trace!(other, "Ignoring proof result for another handshake");
                        Routed::Ignore
                    }
                    _ => Routed::Response(ProofEnvelope::from_message(message.data)),
                }
            }
            other => {
                trace!(message_type = ?other, "Ignoring unrelated message");
                Routed::Ignore
            }
        }
    }

    /// Validate an envelope received out of band
    pub async fn validate_envelope(&self, envelope: ProofEnvelope) -> VerificationOutcome {
        self.validator.validate(envelope).await
    }
}
