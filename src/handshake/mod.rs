//! Proof-request handshake between a requester and an isolated proof portal

mod coordinator;
mod hub;
mod launcher;
mod state;
mod validation;

pub use coordinator::{
    HandshakeConfig, HandshakeCoordinator, HandshakeReport, DEFAULT_RESEND_INTERVAL,
    DEFAULT_RESPONSE_TIMEOUT,
};
pub use hub::{InboundMessage, MessageHub, Subscription};
pub use launcher::{
    challenge_ack, challenge_from_url, challenge_message, challenge_url, ChallengeTransport,
    InProcessPortalLauncher, LaunchError, LaunchRequest, PortalLauncher, PortalWindow,
};
pub use state::HandshakeState;
pub use validation::ResponseValidator;
