// SPDX-FileCopyrightText: 2026 Taplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Public API Module
//!
//! Configuration, unified error type, event plumbing and the [`Pairing`]
//! facade collaborator code talks to.

pub mod config;
pub mod error;
pub mod events;
pub mod pairing;

pub use config::PairingConfig;
pub use error::{TaplinkError, TaplinkResult};
pub use events::{event_channel, EventSink, EventStream, PairingEvent};
pub use pairing::Pairing;
