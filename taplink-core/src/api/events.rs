//! Event Stream
//!
//! Channel-based delivery of pairing events to the collaborator layer.
//! An explicit stream (rather than ad-hoc callbacks) makes ordering part
//! of the contract: events arrive in the order they were emitted, and a
//! slow consumer buffers rather than blocking the scan loop.

use std::sync::mpsc;
use std::time::Duration;

use crate::discovery::error::CapabilityError;
use crate::discovery::filter::{DetectionEvent, DetectionSource};
use crate::handshake::coordinator::HandshakeUpdate;

/// Events emitted by the pairing core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// The proximity filter qualified a detection.
    DeviceDetected(DetectionEvent),
    /// A detection is waiting for the user to confirm a proposal.
    ProposalAvailable(DetectionEvent),
    /// The user confirmed; the proposal is pending with the peer.
    HandshakeProposed(DetectionSource),
    /// The pending proposal was accepted.
    HandshakeAccepted(DetectionSource),
    /// The pending proposal was rejected.
    HandshakeRejected(DetectionSource),
    /// The pending proposal expired without a response.
    HandshakeTimedOut(DetectionSource),
    /// A hardware or permission failure stopped the scan. Emitted once
    /// per failed start, never retried automatically.
    CapabilityError(CapabilityError),
}

impl From<HandshakeUpdate> for PairingEvent {
    fn from(update: HandshakeUpdate) -> Self {
        match update {
            HandshakeUpdate::ProposalAvailable(event) => PairingEvent::ProposalAvailable(event),
            HandshakeUpdate::Proposed(peer) => PairingEvent::HandshakeProposed(peer),
            HandshakeUpdate::Accepted(peer) => PairingEvent::HandshakeAccepted(peer),
            HandshakeUpdate::Rejected(peer) => PairingEvent::HandshakeRejected(peer),
            HandshakeUpdate::TimedOut(peer) => PairingEvent::HandshakeTimedOut(peer),
        }
    }
}

/// Sending half of the event channel. Cheap to clone into workers;
/// `emit` never blocks.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<PairingEvent>,
}

impl EventSink {
    /// Emits an event. A disconnected consumer is not an error; the
    /// event is simply dropped.
    pub fn emit(&self, event: PairingEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event dropped, collaborator stream closed");
        }
    }
}

/// Receiving half of the event channel, handed to the collaborator.
pub struct EventStream {
    rx: mpsc::Receiver<PairingEvent>,
}

impl EventStream {
    /// Returns the next buffered event without waiting.
    pub fn try_next(&self) -> Option<PairingEvent> {
        self.rx.try_recv().ok()
    }

    /// Blocks up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<PairingEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Drains everything currently buffered.
    pub fn drain(&self) -> Vec<PairingEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Creates a connected sink/stream pair.
pub fn event_channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel();
    (EventSink { tx }, EventStream { rx })
}
