// SPDX-FileCopyrightText: 2026 Taplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Radio Capability Port
//!
//! Abstraction over the two discovery transports: passive tag reads and
//! short-range beacon scans. The port exposes capability checks and raw,
//! unfiltered readings; it performs no qualification and holds the only
//! reference to the platform adapters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::error::CapabilityError;
use super::filter::FilterCriteria;

/// A raw beacon reading as produced by the radio, before qualification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBeaconReading {
    /// Advertised device name, if any.
    pub name: Option<String>,
    /// Signal strength in dBm.
    pub rssi_dbm: i16,
    /// Device-level identifier (MAC or platform handle).
    pub device_id: String,
}

impl RawBeaconReading {
    /// Creates a named reading.
    pub fn new(name: &str, rssi_dbm: i16, device_id: &str) -> Self {
        RawBeaconReading {
            name: Some(name.to_string()),
            rssi_dbm,
            device_id: device_id.to_string(),
        }
    }

    /// Creates a reading with no advertised name.
    pub fn unnamed(rssi_dbm: i16, device_id: &str) -> Self {
        RawBeaconReading {
            name: None,
            rssi_dbm,
            device_id: device_id.to_string(),
        }
    }
}

/// Opaque handle for one active hardware beacon scan.
///
/// Owned exclusively by the duty-cycle scan controller; no other
/// component may start or stop the hardware scan directly.
#[derive(Debug, PartialEq, Eq)]
pub struct ScanHandle(u64);

impl ScanHandle {
    /// Raw handle value, for diagnostics.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Capability port over the platform's short-range radios.
///
/// Implementations own their adapter state; it is injected once at
/// construction and never reached through ambient/static access.
pub trait RadioPort: Send + Sync {
    /// Returns false if the hosting device has no tag-read hardware.
    /// Callers must not attempt tag reads in that case.
    fn is_tag_reader_available(&self) -> bool;

    /// Returns false if short-range radio hardware or permission is absent.
    fn is_beacon_scan_available(&self) -> bool;

    /// Starts a single hardware beacon scan session.
    fn start_beacon_scan(&self, criteria: &FilterCriteria) -> Result<ScanHandle, CapabilityError>;

    /// Stops the hardware scan for the given handle.
    fn stop_beacon_scan(&self, handle: ScanHandle);

    /// Blocks up to `timeout` for the next raw beacon reading on an
    /// active scan. Returns `None` on timeout or if the scan is closed.
    fn poll_beacon(&self, handle: &ScanHandle, timeout: Duration) -> Option<RawBeaconReading>;

    /// Blocks up to `timeout` for the next raw tag payload. The tag
    /// stream is lazy, infinite and restartable; emission stops when the
    /// underlying hardware session is closed.
    fn next_tag_read(&self, timeout: Duration) -> Option<Vec<u8>>;
}

#[derive(Default)]
struct MockRadioQueues {
    beacons: VecDeque<RawBeaconReading>,
    tags: VecDeque<Vec<u8>>,
    active_scan: Option<u64>,
}

/// Mock radio port for tests.
///
/// Readings are injected by the test (or by a platform shim pushing tag
/// intents) and handed out through the blocking poll methods. The mock
/// accounts for started/stopped hardware scans so tests can assert that
/// no radio session leaks past `stop()`.
pub struct MockRadio {
    tag_reader_available: bool,
    beacon_scan_available: bool,
    queues: Mutex<MockRadioQueues>,
    wakeup: Condvar,
    next_handle: AtomicU64,
    starts: AtomicUsize,
    forced_start_error: Mutex<Option<CapabilityError>>,
}

impl MockRadio {
    /// Creates a mock with both transports available.
    pub fn new() -> Self {
        MockRadio {
            tag_reader_available: true,
            beacon_scan_available: true,
            queues: Mutex::new(MockRadioQueues::default()),
            wakeup: Condvar::new(),
            next_handle: AtomicU64::new(1),
            starts: AtomicUsize::new(0),
            forced_start_error: Mutex::new(None),
        }
    }

    /// Creates a mock with per-transport availability.
    pub fn with_capabilities(tag_reader: bool, beacon_scan: bool) -> Self {
        MockRadio {
            tag_reader_available: tag_reader,
            beacon_scan_available: beacon_scan,
            ..Self::new()
        }
    }

    /// Makes the next `start_beacon_scan` fail with `error`.
    pub fn fail_next_start(&self, error: CapabilityError) {
        *self.forced_start_error.lock().expect("mutex poisoned") = Some(error);
    }

    /// Injects a raw beacon reading, waking any pending poll.
    pub fn inject_beacon(&self, reading: RawBeaconReading) {
        let mut queues = self.queues.lock().expect("mutex poisoned");
        queues.beacons.push_back(reading);
        self.wakeup.notify_all();
    }

    /// Injects a raw tag payload, waking any pending read.
    pub fn inject_tag(&self, payload: &[u8]) {
        let mut queues = self.queues.lock().expect("mutex poisoned");
        queues.tags.push_back(payload.to_vec());
        self.wakeup.notify_all();
    }

    /// Number of `start_beacon_scan` calls that succeeded.
    pub fn started_scans(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Returns true while a hardware scan is open.
    pub fn scan_active(&self) -> bool {
        self.queues
            .lock()
            .expect("mutex poisoned")
            .active_scan
            .is_some()
    }
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioPort for MockRadio {
    fn is_tag_reader_available(&self) -> bool {
        self.tag_reader_available
    }

    fn is_beacon_scan_available(&self) -> bool {
        self.beacon_scan_available
    }

    fn start_beacon_scan(&self, _criteria: &FilterCriteria) -> Result<ScanHandle, CapabilityError> {
        if let Some(error) = self.forced_start_error.lock().expect("mutex poisoned").take() {
            return Err(error);
        }
        if !self.beacon_scan_available {
            return Err(CapabilityError::HardwareUnavailable);
        }

        let mut queues = self.queues.lock().expect("mutex poisoned");
        if queues.active_scan.is_some() {
            return Err(CapabilityError::AlreadyActive);
        }
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        queues.active_scan = Some(id);
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(ScanHandle(id))
    }

    fn stop_beacon_scan(&self, handle: ScanHandle) {
        let mut queues = self.queues.lock().expect("mutex poisoned");
        if queues.active_scan == Some(handle.0) {
            queues.active_scan = None;
        }
        self.wakeup.notify_all();
    }

    fn poll_beacon(&self, handle: &ScanHandle, timeout: Duration) -> Option<RawBeaconReading> {
        let deadline = Instant::now() + timeout;
        let mut queues = self.queues.lock().expect("mutex poisoned");
        loop {
            if queues.active_scan != Some(handle.0) {
                return None;
            }
            if let Some(reading) = queues.beacons.pop_front() {
                return Some(reading);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, result) = self
                .wakeup
                .wait_timeout(queues, remaining)
                .expect("mutex poisoned");
            queues = guard;
            if result.timed_out() && queues.beacons.is_empty() {
                return None;
            }
        }
    }

    fn next_tag_read(&self, timeout: Duration) -> Option<Vec<u8>> {
        if !self.tag_reader_available {
            return None;
        }
        let deadline = Instant::now() + timeout;
        let mut queues = self.queues.lock().expect("mutex poisoned");
        loop {
            if let Some(payload) = queues.tags.pop_front() {
                return Some(payload);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, result) = self
                .wakeup
                .wait_timeout(queues, remaining)
                .expect("mutex poisoned");
            queues = guard;
            if result.timed_out() && queues.tags.is_empty() {
                return None;
            }
        }
    }
}
