//! Pairing Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::filter::FilterCriteria;

/// Configuration for the pairing core. Every field has a default; the
/// defaults match the scan cadence of the reference hardware profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Exact beacon name to pair with; `None` accepts any name.
    pub filter_name: Option<String>,

    /// Beacons at or below this signal strength are ignored.
    /// -50 dBm approximates 2-5 cm proximity.
    pub rssi_threshold_dbm: i16,

    /// Duration of one active scan window.
    pub scan_window_ms: u64,

    /// Pause between scan windows, bounding radio duty cycle and
    /// battery draw.
    pub pause_ms: u64,

    /// How long a proposal may stay unanswered before timing out.
    pub proposal_timeout_ms: u64,

    /// Window in which repeat detections of the same identifier are
    /// suppressed.
    pub debounce_window_ms: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        PairingConfig {
            filter_name: None,
            rssi_threshold_dbm: -50,
            scan_window_ms: 2000,
            pause_ms: 500,
            proposal_timeout_ms: 30_000,
            debounce_window_ms: 2000,
        }
    }
}

impl PairingConfig {
    /// Pair only with beacons advertising exactly `name`.
    pub fn with_filter_name(mut self, name: &str) -> Self {
        self.filter_name = Some(name.to_string());
        self
    }

    /// Override the scan window / pause cadence.
    pub fn with_duty_cycle(mut self, scan_window_ms: u64, pause_ms: u64) -> Self {
        self.scan_window_ms = scan_window_ms;
        self.pause_ms = pause_ms;
        self
    }

    /// Override the proposal timeout.
    pub fn with_proposal_timeout(mut self, timeout_ms: u64) -> Self {
        self.proposal_timeout_ms = timeout_ms;
        self
    }

    /// Name criterion in filter form.
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            name: self.filter_name.clone(),
        }
    }

    /// Scan window as a `Duration`.
    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }

    /// Pause as a `Duration`.
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    /// Proposal timeout as a `Duration`.
    pub fn proposal_timeout(&self) -> Duration {
        Duration::from_millis(self.proposal_timeout_ms)
    }

    /// Debounce window as a `Duration`.
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    /// Serializes to JSON, for persistence in the hosting app.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes from JSON. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Rejects configurations the scan loop cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.scan_window_ms == 0 {
            return Err("scan_window_ms must be greater than zero".into());
        }
        if self.proposal_timeout_ms == 0 {
            return Err("proposal_timeout_ms must be greater than zero".into());
        }
        Ok(())
    }
}
