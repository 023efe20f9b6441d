// SPDX-FileCopyrightText: 2026 Taplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Device Discovery Module
//!
//! Radio capability port, proximity qualification and the duty-cycle
//! scan controller that drives both.

pub mod error;
pub mod filter;
pub mod radio;
pub mod scanner;

pub use error::{CapabilityError, ScanError};
pub use filter::{
    DetectionEvent, DetectionSource, FilterCriteria, ProximityFilter, UNKNOWN_DEVICE_NAME,
};
pub use radio::{MockRadio, RadioPort, RawBeaconReading, ScanHandle};
pub use scanner::{
    CancellationToken, Preconditions, ScanConfig, ScanController, ScanSession, ScanState,
    SessionState,
};
