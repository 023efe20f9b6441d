// SPDX-FileCopyrightText: 2026 Taplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pairing facade.
//!
//! Wires the radio port, proximity filter, duty-cycle scan controller
//! and handshake coordinator together behind one handle. Collaborators
//! drive discovery through this type and consume the [`EventStream`]
//! returned alongside it.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use uuid::Uuid;

use crate::discovery::radio::RadioPort;
use crate::discovery::scanner::{
    Preconditions, ScanConfig, ScanController, ScanSession, ScanState,
};
use crate::handshake::coordinator::{HandshakeCoordinator, HandshakeState, HandshakeUpdate};

use super::config::PairingConfig;
use super::error::{TaplinkError, TaplinkResult};
use super::events::{event_channel, EventSink, EventStream};

/// Entry point for proximity-triggered pairing.
///
/// Owns the scan controller and shares the handshake coordinator with
/// its worker threads. Dropping the facade stops any running session.
pub struct Pairing<R: RadioPort + 'static> {
    controller: ScanController<R>,
    coordinator: Arc<Mutex<HandshakeCoordinator>>,
    preconditions: Arc<Preconditions>,
    sink: EventSink,
}

impl<R: RadioPort + 'static> Pairing<R> {
    /// Builds the pairing stack around `radio` and returns it together
    /// with the event stream the collaborator consumes.
    pub fn new(radio: R, config: PairingConfig) -> TaplinkResult<(Self, EventStream)> {
        config.validate().map_err(TaplinkError::Configuration)?;

        let (sink, stream) = event_channel();
        let preconditions = Arc::new(Preconditions::default());
        let coordinator = Arc::new(Mutex::new(HandshakeCoordinator::new(
            config.proposal_timeout(),
        )));
        let scan_config = ScanConfig {
            criteria: config.criteria(),
            rssi_threshold_dbm: config.rssi_threshold_dbm,
            scan_window: config.scan_window(),
            pause: config.pause(),
            debounce_window: config.debounce_window(),
        };
        let controller = ScanController::new(
            radio,
            scan_config,
            preconditions.clone(),
            coordinator.clone(),
            sink.clone(),
        );

        Ok((
            Pairing {
                controller,
                coordinator,
                preconditions,
                sink,
            },
            stream,
        ))
    }

    /// Marks the local profile as ready for exchange.
    pub fn set_profile_ready(&self, ready: bool) {
        self.preconditions.set_profile_ready(ready);
    }

    /// Records the platform's radio permission decision.
    pub fn set_radio_permission(&self, granted: bool) {
        self.preconditions.set_radio_permission(granted);
    }

    /// Starts discovery. Idempotent while a session is running.
    pub fn start_discovery(&self) -> TaplinkResult<Uuid> {
        Ok(self.controller.start()?)
    }

    /// Stops discovery and waits for the hardware scan to close.
    pub fn stop_discovery(&self) {
        self.controller.stop();
    }

    /// Current scan controller state.
    pub fn scan_state(&self) -> ScanState {
        self.controller.state()
    }

    /// Snapshot of the running scan session, if any.
    pub fn session(&self) -> Option<ScanSession> {
        self.controller.session()
    }

    /// Malformed radio readings dropped since construction.
    pub fn dropped_readings(&self) -> u64 {
        self.controller.dropped_readings()
    }

    /// The underlying radio port, for capability checks.
    pub fn radio(&self) -> &R {
        self.controller.radio()
    }

    /// Current handshake state.
    pub fn handshake_state(&self) -> HandshakeState {
        self.coordinator
            .lock()
            .expect("mutex poisoned")
            .state()
            .clone()
    }

    /// Sends the pending proposal to the detected peer.
    pub fn confirm_proposal(&self) -> TaplinkResult<()> {
        let update = self
            .coordinator
            .lock()
            .expect("mutex poisoned")
            .confirm(Instant::now())?;
        self.publish(update);
        Ok(())
    }

    /// Accepts the outstanding proposal.
    pub fn accept(&self) -> TaplinkResult<()> {
        let update = self
            .coordinator
            .lock()
            .expect("mutex poisoned")
            .accept(Instant::now())?;
        self.publish(update);
        Ok(())
    }

    /// Rejects the outstanding proposal.
    pub fn reject(&self) -> TaplinkResult<()> {
        let update = self
            .coordinator
            .lock()
            .expect("mutex poisoned")
            .reject(Instant::now())?;
        self.publish(update);
        Ok(())
    }

    /// Acknowledges a terminal handshake outcome, re-arming detection.
    /// Returns false if there was nothing to acknowledge.
    pub fn acknowledge_handshake(&self) -> bool {
        self.coordinator
            .lock()
            .expect("mutex poisoned")
            .acknowledge()
    }

    fn publish(&self, update: HandshakeUpdate) {
        self.sink.emit(update.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::events::PairingEvent;
    use crate::discovery::radio::{MockRadio, RawBeaconReading};
    use std::time::Duration;

    fn fast_config() -> PairingConfig {
        PairingConfig {
            scan_window_ms: 40,
            pause_ms: 10,
            ..PairingConfig::default()
        }
        .with_filter_name("Alex")
    }

    fn ready(radio: MockRadio) -> (Pairing<MockRadio>, EventStream) {
        let (pairing, stream) = Pairing::new(radio, fast_config()).unwrap();
        pairing.set_profile_ready(true);
        pairing.set_radio_permission(true);
        (pairing, stream)
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = PairingConfig {
            scan_window_ms: 0,
            ..PairingConfig::default()
        };
        assert!(matches!(
            Pairing::new(MockRadio::new(), config),
            Err(TaplinkError::Configuration(_))
        ));
    }

    #[test]
    fn discovery_requires_preconditions() {
        let (pairing, _stream) = Pairing::new(MockRadio::new(), fast_config()).unwrap();
        assert!(pairing.start_discovery().is_err());
        assert_eq!(pairing.scan_state(), ScanState::Stopped);
    }

    #[test]
    fn detection_flows_to_the_event_stream() {
        let radio = MockRadio::new();
        radio.inject_beacon(RawBeaconReading::new("Alex", -40, "aa:bb"));
        let (pairing, stream) = ready(radio);

        pairing.start_discovery().unwrap();
        let first = stream.next_timeout(Duration::from_secs(2));
        assert!(matches!(first, Some(PairingEvent::DeviceDetected(_))));
        let second = stream.next_timeout(Duration::from_secs(2));
        assert!(matches!(second, Some(PairingEvent::ProposalAvailable(_))));

        pairing.stop_discovery();
    }

    #[test]
    fn accept_without_proposal_is_an_error() {
        let (pairing, _stream) = ready(MockRadio::new());
        assert!(matches!(pairing.accept(), Err(TaplinkError::Handshake(_))));
    }

    #[test]
    fn acknowledge_without_outcome_returns_false() {
        let (pairing, _stream) = ready(MockRadio::new());
        assert!(!pairing.acknowledge_handshake());
    }
}
