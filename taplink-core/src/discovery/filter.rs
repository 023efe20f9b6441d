//! Proximity Filter
//!
//! Turns raw transport readings into qualified `DetectionEvent`s:
//! signal-strength threshold, name matching and de-duplication.
//! Malformed input is dropped and counted, never surfaced as an error.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Name substituted for beacons that advertise none. Never matches a
/// configured name criterion.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// Name criterion applied to beacon readings.
///
/// `None` matches any advertised name; `Some(name)` requires an exact
/// match, and unnamed beacons never satisfy it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Exact device name to match, if any.
    pub name: Option<String>,
}

impl FilterCriteria {
    /// Criterion matching a single exact device name.
    pub fn named(name: &str) -> Self {
        FilterCriteria {
            name: Some(name.to_string()),
        }
    }

    /// Criterion matching any advertised name.
    pub fn any() -> Self {
        FilterCriteria::default()
    }

    fn matches(&self, advertised: &str) -> bool {
        match &self.name {
            Some(wanted) => advertised == wanted && advertised != UNKNOWN_DEVICE_NAME,
            None => true,
        }
    }
}

/// Origin of a qualified detection. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionSource {
    /// A passive tag was read by physical tap.
    TagRead {
        /// Stable uppercase-hex identifier derived from the raw tag bytes.
        tag_id: String,
    },
    /// A short-range radio advertisement passed qualification.
    RadioBeacon {
        /// Advertised device name.
        name: String,
        /// Signal strength in dBm at detection time.
        rssi_dbm: i16,
        /// Device-level identifier.
        device_id: String,
    },
}

impl DetectionSource {
    /// Human-readable peer name for the collaborator layer.
    pub fn display_name(&self) -> &str {
        match self {
            DetectionSource::TagRead { tag_id } => tag_id,
            DetectionSource::RadioBeacon { name, .. } => name,
        }
    }

    /// Key used for de-duplication across repeat observations.
    pub fn dedup_key(&self) -> &str {
        match self {
            DetectionSource::TagRead { tag_id } => tag_id,
            DetectionSource::RadioBeacon { device_id, .. } => device_id,
        }
    }
}

/// A qualified detection, produced only by the filter and consumed
/// exactly once by the handshake coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionEvent {
    /// What was detected.
    pub source: DetectionSource,
    /// When the filter qualified it.
    pub observed_at: Instant,
}

/// Stateful proximity filter: qualification rules plus a per-identifier
/// debounce window.
pub struct ProximityFilter {
    criteria: FilterCriteria,
    rssi_threshold_dbm: i16,
    debounce_window: Duration,
    recent: HashMap<String, Instant>,
    dropped: u64,
}

impl ProximityFilter {
    /// Creates a filter with the given qualification parameters.
    pub fn new(criteria: FilterCriteria, rssi_threshold_dbm: i16, debounce_window: Duration) -> Self {
        ProximityFilter {
            criteria,
            rssi_threshold_dbm,
            debounce_window,
            recent: HashMap::new(),
            dropped: 0,
        }
    }

    /// Qualifies a raw beacon reading.
    ///
    /// Emits at most one event: the reading must be above the signal
    /// threshold (strictly), match the name criterion and not be a
    /// duplicate within the debounce window.
    pub fn qualify_beacon(
        &mut self,
        reading: super::radio::RawBeaconReading,
        now: Instant,
    ) -> Option<DetectionEvent> {
        if reading.device_id.is_empty() {
            self.drop_malformed("beacon reading without device id");
            return None;
        }
        if reading.rssi_dbm <= self.rssi_threshold_dbm {
            return None;
        }

        let name = reading
            .name
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());
        if !self.criteria.matches(&name) {
            return None;
        }
        if self.debounced(&reading.device_id, now) {
            return None;
        }

        tracing::debug!(name = %name, rssi = reading.rssi_dbm, "beacon qualified");
        Some(DetectionEvent {
            source: DetectionSource::RadioBeacon {
                name,
                rssi_dbm: reading.rssi_dbm,
                device_id: reading.device_id,
            },
            observed_at: now,
        })
    }

    /// Qualifies a raw tag payload.
    ///
    /// Tags have no distance concept; a physical tap implies proximity,
    /// so every parseable read qualifies (subject to debounce).
    pub fn qualify_tag(&mut self, raw: &[u8], now: Instant) -> Option<DetectionEvent> {
        if raw.is_empty() {
            self.drop_malformed("empty tag payload");
            return None;
        }

        let tag_id = hex::encode_upper(raw);
        if self.debounced(&tag_id, now) {
            return None;
        }

        tracing::debug!(tag_id = %tag_id, "tag read qualified");
        Some(DetectionEvent {
            source: DetectionSource::TagRead { tag_id },
            observed_at: now,
        })
    }

    /// Number of malformed readings dropped so far. Diagnostic only.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Returns true when `key` was already seen within the window.
    /// Suppressed repeats do not extend the window.
    fn debounced(&mut self, key: &str, now: Instant) -> bool {
        let window = self.debounce_window;
        self.recent
            .retain(|_, seen| now.saturating_duration_since(*seen) < window);

        if self.recent.contains_key(key) {
            return true;
        }
        self.recent.insert(key.to_string(), now);
        false
    }

    fn drop_malformed(&mut self, reason: &str) {
        self.dropped += 1;
        tracing::debug!(reason, dropped = self.dropped, "malformed reading dropped");
    }
}
