//! Taplink Core Library
//!
//! Proximity-triggered pairing core: tap-to-pair tag reads and
//! short-range beacon scans, filtered down to arm's-length detections
//! that arm a handshake with the peer device.

pub mod api;
pub mod discovery;
pub mod handshake;

pub use api::{
    event_channel, EventSink, EventStream, Pairing, PairingConfig, PairingEvent, TaplinkError,
    TaplinkResult,
};
pub use discovery::{
    CapabilityError, DetectionEvent, DetectionSource, FilterCriteria, MockRadio, Preconditions,
    ProximityFilter, RadioPort, RawBeaconReading, ScanConfig, ScanController, ScanError,
    ScanHandle, ScanSession, ScanState, SessionState, UNKNOWN_DEVICE_NAME,
};
pub use handshake::{
    HandshakeCoordinator, HandshakeError, HandshakeState, HandshakeUpdate,
    DEFAULT_PROPOSAL_TIMEOUT,
};
