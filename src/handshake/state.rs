//! Handshake lifecycle states

use serde::Serialize;
use tracing::{debug, error};

use crate::infra::{FailureKind, VerificationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Idle,
    Issued,
    AwaitingResponse,
    Received,
    Validating,
    Succeeded,
    Failed,
}

impl HandshakeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeState::Idle => "idle",
            HandshakeState::Issued => "issued",
            HandshakeState::AwaitingResponse => "awaiting_response",
            HandshakeState::Received => "received",
            HandshakeState::Validating => "validating",
            HandshakeState::Succeeded => "succeeded",
            HandshakeState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Succeeded | HandshakeState::Failed)
    }

    /// Whether `self -> next` is an edge of the lifecycle
    pub fn can_transition_to(&self, next: HandshakeState) -> bool {
        use HandshakeState::*;
        matches!(
            (self, next),
            (Idle, Issued)
                | (Idle, Failed)
                | (Issued, AwaitingResponse)
                | (Issued, Failed)
                | (AwaitingResponse, Received)
                | (AwaitingResponse, Failed)
                | (Received, Validating)
                | (Received, Failed)
                | (Validating, Succeeded)
                | (Validating, Failed)
        )
    }
}

impl std::fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records the path a handshake took
#[derive(Debug, Clone)]
pub(crate) struct StateTracker {
    current: HandshakeState,
    visited: Vec<HandshakeState>,
}

impl StateTracker {
    pub(crate) fn new() -> Self {
        Self {
            current: HandshakeState::Idle,
            visited: vec![HandshakeState::Idle],
        }
    }

    pub(crate) fn current(&self) -> HandshakeState {
        self.current
    }

    /// Advance to `next`; an illegal edge is a coordinator bug, not a peer fault
    pub(crate) fn advance(&mut self, next: HandshakeState) -> Result<(), VerificationError> {
        if !self.current.can_transition_to(next) {
            error!(from = %self.current, to = %next, "Illegal handshake transition");
            return Err(VerificationError::Internal(format!(
                "illegal handshake transition {} -> {}",
                self.current, next
            )));
        }
        debug!(from = %self.current, to = %next, "Handshake transition");
        self.current = next;
        self.visited.push(next);
        Ok(())
    }

    /// Move to `Failed` from any non-terminal state
    pub(crate) fn fail(&mut self) {
        if !self.current.is_terminal() {
            debug!(from = %self.current, to = %HandshakeState::Failed, "Handshake transition");
            self.current = HandshakeState::Failed;
            self.visited.push(HandshakeState::Failed);
        }
    }

    pub(crate) fn into_visited(self) -> Vec<HandshakeState> {
        self.visited
    }
}

/// Failure reason as it appears in reports and logs
pub(crate) fn failure_label(err: &VerificationError) -> (&'static str, bool) {
    let kind: FailureKind = err.kind();
    (kind.as_str(), kind.is_security_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_edges() {
        let mut tracker = StateTracker::new();
        for next in [
            HandshakeState::Issued,
            HandshakeState::AwaitingResponse,
            HandshakeState::Received,
            HandshakeState::Validating,
            HandshakeState::Succeeded,
        ] {
            tracker.advance(next).unwrap();
        }
        assert!(tracker.current().is_terminal());
        assert_eq!(tracker.into_visited().len(), 6);
    }

    #[test]
    fn test_launch_failure_skips_issued() {
        let mut tracker = StateTracker::new();
        tracker.fail();
        assert_eq!(
            tracker.into_visited(),
            vec![HandshakeState::Idle, HandshakeState::Failed]
        );
    }

    #[test]
    fn test_no_exit_from_terminal() {
        assert!(!HandshakeState::Succeeded.can_transition_to(HandshakeState::Failed));
        assert!(!HandshakeState::Failed.can_transition_to(HandshakeState::Validating));

        let mut tracker = StateTracker::new();
        tracker.fail();
        tracker.fail();
        assert_eq!(tracker.into_visited().len(), 2);
    }

    #[test]
    fn test_skipping_states_rejected() {
        let mut tracker = StateTracker::new();
        let err = tracker.advance(HandshakeState::Received).unwrap_err();
        assert_eq!(tracker.current(), HandshakeState::Idle);

        assert_eq!(err.kind(), FailureKind::Internal);
        assert_eq!(failure_label(&err), ("internal", false));
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&HandshakeState::AwaitingResponse).unwrap();
        assert_eq!(json, "\"awaiting_response\"");
    }
}
