//! Handshake Coordinator
//!
//! State machine turning a qualified detection into a proposal and
//! resolving it to accepted, rejected or timed out. The coordinator is
//! a protocol skeleton: no key exchange or transfer happens here, the
//! collaborator layer drives confirm/accept/reject and acknowledges
//! terminal states.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::discovery::filter::{DetectionEvent, DetectionSource};

/// Default proposal timeout.
pub const DEFAULT_PROPOSAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from driving the coordinator out of order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The requested transition is not valid from the current state.
    #[error("invalid handshake state: {0}")]
    InvalidState(String),
}

/// State of the single in-flight handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// No detection in flight.
    Idle,
    /// A detection arrived; waiting for the user to confirm a proposal.
    AwaitingProposal(DetectionEvent),
    /// Proposal sent to the peer's collaborator; awaiting accept/reject.
    Proposed {
        /// The detected peer.
        peer: DetectionSource,
        /// When the proposal was made; measured against the timeout on
        /// every detection and tick.
        proposed_at: Instant,
    },
    /// Terminal: the proposal was accepted.
    Accepted(DetectionSource),
    /// Terminal: the proposal was rejected.
    Rejected(DetectionSource),
    /// Terminal: no response within the proposal timeout.
    TimedOut(DetectionSource),
}

impl HandshakeState {
    /// True for states that require a collaborator acknowledgement.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandshakeState::Accepted(_) | HandshakeState::Rejected(_) | HandshakeState::TimedOut(_)
        )
    }
}

/// Lifecycle notification produced by a coordinator transition.
///
/// The caller forwards these to the collaborator event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeUpdate {
    /// A detection is waiting for user confirmation.
    ProposalAvailable(DetectionEvent),
    /// The user confirmed; a proposal is now pending.
    Proposed(DetectionSource),
    /// The pending proposal was accepted.
    Accepted(DetectionSource),
    /// The pending proposal was rejected.
    Rejected(DetectionSource),
    /// The pending proposal expired.
    TimedOut(DetectionSource),
}

/// Single-slot handshake state machine.
///
/// All mutation goes through the transition methods; at most one
/// handshake is in flight, and terminal states are only left via
/// [`acknowledge`](Self::acknowledge).
pub struct HandshakeCoordinator {
    state: HandshakeState,
    proposal_timeout: Duration,
}

impl HandshakeCoordinator {
    /// Creates a coordinator in `Idle` with the given proposal timeout.
    pub fn new(proposal_timeout: Duration) -> Self {
        HandshakeCoordinator {
            state: HandshakeState::Idle,
            proposal_timeout,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Feeds a qualified detection into the machine.
    ///
    /// From `Idle` this opens a proposal slot; in any other state the
    /// detection is dropped (no queueing of overlapping proposals). An
    /// expired pending proposal times out before the detection is
    /// considered.
    pub fn on_detection(&mut self, event: DetectionEvent, now: Instant) -> Option<HandshakeUpdate> {
        if let Some(update) = self.expire(now) {
            return Some(update);
        }

        match self.state {
            HandshakeState::Idle => {
                let update = HandshakeUpdate::ProposalAvailable(event.clone());
                self.state = HandshakeState::AwaitingProposal(event);
                Some(update)
            }
            _ => {
                tracing::debug!(peer = %event.source.display_name(), "detection ignored, handshake in flight");
                None
            }
        }
    }

    /// User confirmed the available detection: moves to `Proposed`.
    pub fn confirm(&mut self, now: Instant) -> Result<HandshakeUpdate, HandshakeError> {
        match std::mem::replace(&mut self.state, HandshakeState::Idle) {
            HandshakeState::AwaitingProposal(event) => {
                let peer = event.source;
                self.state = HandshakeState::Proposed {
                    peer: peer.clone(),
                    proposed_at: now,
                };
                Ok(HandshakeUpdate::Proposed(peer))
            }
            other => {
                self.state = other;
                Err(HandshakeError::InvalidState(
                    "no detection awaiting confirmation".into(),
                ))
            }
        }
    }

    /// Accepts the pending proposal, unless it already expired.
    pub fn accept(&mut self, now: Instant) -> Result<HandshakeUpdate, HandshakeError> {
        self.resolve(now, HandshakeState::Accepted, HandshakeUpdate::Accepted)
    }

    /// Rejects the pending proposal, unless it already expired.
    pub fn reject(&mut self, now: Instant) -> Result<HandshakeUpdate, HandshakeError> {
        self.resolve(now, HandshakeState::Rejected, HandshakeUpdate::Rejected)
    }

    /// Timeout check, called on every scan-cycle tick. No timer thread
    /// exists; this keeps the coordinator single-threaded-cooperative.
    pub fn tick(&mut self, now: Instant) -> Option<HandshakeUpdate> {
        self.expire(now)
    }

    /// Collaborator acknowledgement of a terminal state: resets to
    /// `Idle`. Returns false (and stays put) in non-terminal states; the
    /// coordinator never self-resets.
    pub fn acknowledge(&mut self) -> bool {
        if self.state.is_terminal() {
            self.state = HandshakeState::Idle;
            true
        } else {
            false
        }
    }

    fn resolve(
        &mut self,
        now: Instant,
        terminal: fn(DetectionSource) -> HandshakeState,
        update: fn(DetectionSource) -> HandshakeUpdate,
    ) -> Result<HandshakeUpdate, HandshakeError> {
        if let Some(timed_out) = self.expire(now) {
            return Ok(timed_out);
        }

        match std::mem::replace(&mut self.state, HandshakeState::Idle) {
            HandshakeState::Proposed { peer, .. } => {
                self.state = terminal(peer.clone());
                Ok(update(peer))
            }
            other => {
                self.state = other;
                Err(HandshakeError::InvalidState("no pending proposal".into()))
            }
        }
    }

    fn expire(&mut self, now: Instant) -> Option<HandshakeUpdate> {
        if let HandshakeState::Proposed { peer, proposed_at } = &self.state {
            if now.saturating_duration_since(*proposed_at) > self.proposal_timeout {
                let peer = peer.clone();
                self.state = HandshakeState::TimedOut(peer.clone());
                return Some(HandshakeUpdate::TimedOut(peer));
            }
        }
        None
    }
}

impl Default for HandshakeCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_PROPOSAL_TIMEOUT)
    }
}
