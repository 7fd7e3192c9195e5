//! Opening the isolated proof-generation context

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::hub::{InboundMessage, MessageHub};
use crate::domain::{Challenge, Nonce, CHALLENGE_ACK_TYPE, CHALLENGE_MESSAGE_TYPE};
use crate::portal::ProofPortal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    /// The host refused to open the context (popup blocker, sandbox policy)
    #[error("launch blocked: {0}")]
    Blocked(String),

    #[error("invalid portal url: {0}")]
    InvalidUrl(String),
}

/// How the challenge reaches the isolated context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeTransport {
    /// `?origin=…&nonce=…` on the launch URL
    UrlParameters,
    /// A `proof-challenge` message resent every `interval` until acknowledged
    HandshakeMessage { interval: Duration },
}

#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub url: Url,
    pub challenge: Challenge,
}

/// Handle to an open isolated context
pub trait PortalWindow: Send + Sync {
    /// Post a message into the context
    fn post_message(&self, message: Value);

    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Opens isolated contexts.
#[async_trait]
pub trait PortalLauncher: Send + Sync {
    async fn launch(&self, request: LaunchRequest) -> Result<Box<dyn PortalWindow>, LaunchError>;
}

/// Launch URL carrying the challenge as query parameters
pub fn challenge_url(portal_url: &Url, challenge: &Challenge) -> Url {
    let mut url = portal_url.clone();
    url.query_pairs_mut()
        .append_pair("origin", &challenge.origin)
        .append_pair("nonce", challenge.nonce.as_str());
    url
}

/// Challenge fields read back from a launch URL
pub fn challenge_from_url(url: &Url) -> Option<(String, Nonce)> {
    let mut origin = None;
    let mut nonce = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "origin" => origin = Some(value.into_owned()),
            "nonce" => nonce = Some(Nonce(value.into_owned())),
            _ => {}
        }
    }
    Some((origin.filter(|o| !o.is_empty())?, nonce.filter(|n| !n.as_str().is_empty())?))
}

pub fn challenge_message(challenge: &Challenge) -> Value {
    json!({
        "type": CHALLENGE_MESSAGE_TYPE,
        "origin": challenge.origin,
        "nonce": challenge.nonce,
    })
}

pub fn challenge_ack(nonce: &Nonce) -> Value {
    json!({
        "type": CHALLENGE_ACK_TYPE,
        "nonce": nonce,
    })
}

fn parse_challenge_message(message: &Value) -> Option<(String, Nonce)> {
    if message.get("type").and_then(Value::as_str) != Some(CHALLENGE_MESSAGE_TYPE) {
        return None;
    }
    let origin = message.get("origin").and_then(Value::as_str)?;
    let nonce = message.get("nonce").and_then(Value::as_str)?;
    Some((origin.to_string(), Nonce::from(nonce)))
}

/// Runs the proof portal as a task in this process.
///
/// The portal's result is delivered to the shared hub under `portal_origin`.
pub struct InProcessPortalLauncher {
    portal: Arc<ProofPortal>,
    hub: Arc<MessageHub>,
    portal_origin: String,
}

impl InProcessPortalLauncher {
    pub fn new(portal: Arc<ProofPortal>, hub: Arc<MessageHub>, portal_origin: impl Into<String>) -> Self {
        Self {
            portal,
            hub,
            portal_origin: portal_origin.into(),
        }
    }
}

#[async_trait]
impl PortalLauncher for InProcessPortalLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<Box<dyn PortalWindow>, LaunchError> {
        let (inbox_tx, mut inbox) = mpsc::unbounded_channel::<Value>();
        let portal = Arc::clone(&self.portal);
        let hub = Arc::clone(&self.hub);
        let portal_origin = self.portal_origin.clone();
        let url = request.url;

        let task = tokio::spawn(async move {
            let (origin, nonce) = match challenge_from_url(&url) {
                Some(challenge) => challenge,
                None => {
                    debug!(%url, "No challenge in url, waiting for handshake message");
                    loop {
                        let Some(message) = inbox.recv().await else {
                            return;
                        };
                        if let Some(challenge) = parse_challenge_message(&message) {
                            hub.deliver(InboundMessage::new(
                                portal_origin.clone(),
                                challenge_ack(&challenge.1),
                            ));
                            break challenge;
                        }
                    }
                }
            };

            match portal.generate(&origin, &nonce).await {
                Ok(envelope) => {
                    info!(%nonce, "Portal posting proof result");
                    hub.deliver(InboundMessage::new(portal_origin, envelope.to_message()));
                }
                Err(e) => warn!(%nonce, error = %e, "Portal failed to generate proof"),
            }
        });

        Ok(Box::new(InProcessWindow { inbox: inbox_tx, task }))
    }
}

struct InProcessWindow {
    inbox: mpsc::UnboundedSender<Value>,
    task: JoinHandle<()>,
}

impl PortalWindow for InProcessWindow {
    fn post_message(&self, message: Value) {
        // a finished portal no longer reads its inbox
        let _ = self.inbox.send(message);
    }

    fn close(&self) {
        self.task.abort();
    }

    fn is_closed(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for InProcessWindow {
    fn drop(&mut self) {
        self.task.abort();
    }
}
