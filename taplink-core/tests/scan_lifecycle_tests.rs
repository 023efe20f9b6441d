// SPDX-FileCopyrightText: 2026 Taplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scan Lifecycle Tests
//!
//! Exercises the duty-cycle scan controller directly: window/pause
//! cadence against the hardware port, exclusive hardware sessions, and
//! the stop/cancellation guarantees.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use taplink_core::{
    event_channel, FilterCriteria, HandshakeCoordinator, MockRadio, PairingEvent, Preconditions,
    ScanConfig, ScanController, ScanState, SessionState,
};

fn fast_config() -> ScanConfig {
    ScanConfig {
        criteria: FilterCriteria::any(),
        scan_window: Duration::from_millis(30),
        pause: Duration::from_millis(10),
        ..ScanConfig::default()
    }
}

fn ready_controller(
    radio: MockRadio,
) -> (ScanController<MockRadio>, taplink_core::EventStream) {
    let (sink, stream) = event_channel();
    let preconditions = Arc::new(Preconditions::default());
    preconditions.set_profile_ready(true);
    preconditions.set_radio_permission(true);
    let coordinator = Arc::new(Mutex::new(HandshakeCoordinator::default()));
    (
        ScanController::new(radio, fast_config(), preconditions, coordinator, sink),
        stream,
    )
}

/// Test: the loop closes each window and opens the next one, so the
/// hardware sees a sequence of short scans rather than one long one.
#[test]
fn test_duty_cycle_reopens_hardware_windows() {
    let (controller, _stream) = ready_controller(MockRadio::new());

    controller.start().expect("scan starts");
    // 30 ms window + 10 ms pause: three full cycles fit in 150 ms.
    thread::sleep(Duration::from_millis(150));
    controller.stop();

    let starts = controller.radio().started_scans();
    assert!(
        starts >= 2,
        "expected multiple scan windows, saw {}",
        starts
    );
    assert!(!controller.radio().scan_active());
}

/// Test: windows never overlap. The mock refuses a second concurrent
/// hardware scan, which the loop would surface as a capability event.
#[test]
fn test_hardware_windows_never_overlap() {
    let (controller, stream) = ready_controller(MockRadio::new());

    controller.start().expect("scan starts");
    thread::sleep(Duration::from_millis(200));
    controller.stop();

    let overlap = stream
        .drain()
        .into_iter()
        .any(|e| matches!(e, PairingEvent::CapabilityError(_)));
    assert!(!overlap, "duty cycle opened overlapping hardware scans");
}

/// Test: stop cancels a wait in flight instead of sleeping it out.
#[test]
fn test_stop_interrupts_promptly() {
    let mut config = fast_config();
    // A scan window far longer than the acceptable stop latency.
    config.scan_window = Duration::from_secs(30);
    let (sink, _stream) = event_channel();
    let preconditions = Arc::new(Preconditions::default());
    preconditions.set_profile_ready(true);
    preconditions.set_radio_permission(true);
    let coordinator = Arc::new(Mutex::new(HandshakeCoordinator::default()));
    let controller =
        ScanController::new(MockRadio::new(), config, preconditions, coordinator, sink);

    controller.start().expect("scan starts");
    let started = std::time::Instant::now();
    controller.stop();

    assert!(
        started.elapsed() < Duration::from_secs(1),
        "stop must not wait out the scan window"
    );
    assert!(!controller.radio().scan_active());
    assert_eq!(controller.state(), ScanState::Stopped);
}

/// Test: flipping a precondition does not kill a running session; the
/// flags gate `start()` only.
#[test]
fn test_precondition_flip_leaves_running_session_alone() {
    let (sink, _stream) = event_channel();
    let preconditions = Arc::new(Preconditions::default());
    preconditions.set_profile_ready(true);
    preconditions.set_radio_permission(true);
    let coordinator = Arc::new(Mutex::new(HandshakeCoordinator::default()));
    let controller = ScanController::new(
        MockRadio::new(),
        fast_config(),
        preconditions.clone(),
        coordinator,
        sink,
    );

    controller.start().expect("scan starts");
    preconditions.set_radio_permission(false);
    thread::sleep(Duration::from_millis(80));

    assert_eq!(controller.state(), ScanState::Active);
    let session = controller.session().expect("session still running");
    assert_eq!(session.state(), SessionState::Running);

    controller.stop();
    // But a fresh start is now refused.
    assert!(controller.start().is_err());
}

/// Test: dropping a running controller joins its workers instead of
/// leaking them.
#[test]
fn test_drop_stops_running_session() {
    let (controller, _stream) = ready_controller(MockRadio::new());
    controller.start().expect("scan starts");
    thread::sleep(Duration::from_millis(20));

    let started = std::time::Instant::now();
    drop(controller);
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "drop must wind the session down promptly"
    );
}
