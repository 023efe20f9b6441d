// SPDX-FileCopyrightText: 2026 Taplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Discovery Error Types

use thiserror::Error;

/// Errors reported by the radio capability port.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// The platform has not granted the short-range radio permission.
    #[error("radio permission denied")]
    PermissionDenied,

    /// The hosting device has no usable short-range radio hardware.
    #[error("radio hardware unavailable")]
    HardwareUnavailable,

    /// A hardware scan session is already active.
    #[error("scan already active")]
    AlreadyActive,
}

/// Errors reported by the duty-cycle scan controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The underlying radio port refused to start a scan.
    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// A collaborator-supplied precondition is not satisfied.
    #[error("precondition not met: {0}")]
    PreconditionNotMet(&'static str),
}
