// SPDX-FileCopyrightText: 2026 Taplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! API Error Types
//!
//! Unified error type for the Taplink API layer.

use thiserror::Error;

use crate::discovery::error::{CapabilityError, ScanError};
use crate::handshake::coordinator::HandshakeError;

/// Unified error type for pairing operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaplinkError {
    /// The radio port refused an operation.
    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// The scan controller refused to start.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// The handshake coordinator was driven out of order.
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for pairing operations.
pub type TaplinkResult<T> = Result<T, TaplinkError>;
