// SPDX-FileCopyrightText: 2026 Taplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Handshake Module
//!
//! Session state machine bridging a qualified detection to the secure
//! exchange that follows it.

pub mod coordinator;

pub use coordinator::{
    HandshakeCoordinator, HandshakeError, HandshakeState, HandshakeUpdate,
    DEFAULT_PROPOSAL_TIMEOUT,
};
