// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Call Signaling
//!
//! Relays offer, answer and ICE candidates for a single peer-to-peer call.
//! Payloads are opaque; the media layer interprets them.

mod error;
pub mod machine;
mod session;
mod signaling;

pub use error::CallError;
pub use machine::{CallMachine, Effects, ORPHAN_ICE_PEERS, ORPHAN_ICE_PER_PEER};
pub use session::{CallDirection, CallEvent, CallSession, CallState, EndReason};
pub use signaling::CallSignaling;

pub use crate::network::PeerRef;
