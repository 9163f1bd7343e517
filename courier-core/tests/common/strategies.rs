// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies
//!
//! Reusable proptest strategies for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for conversation ids, drawn from a small pool so repeats occur.
pub fn conversation_id_strategy() -> impl Strategy<Value = String> {
    "c[0-9]{1,2}"
}

/// Strategy for opaque session descriptions.
pub fn sdp_strategy() -> impl Strategy<Value = Value> {
    "[A-Za-z0-9]{1,12}".prop_map(|sdp| json!({ "sdp": sdp }))
}

/// One trigger applied to the call state machine.
#[derive(Debug, Clone)]
pub enum CallOp {
    Start(String),
    RemoteOffer(String),
    Accept,
    Decline,
    End,
    RemoteAnswer,
    RemoteIce,
    RemoteEnded,
    RemoteDeclined,
    ConnectionLost,
}

/// Strategy for call machine triggers.
pub fn call_op_strategy() -> impl Strategy<Value = CallOp> {
    prop_oneof![
        conversation_id_strategy().prop_map(CallOp::Start),
        "s[0-9]".prop_map(CallOp::RemoteOffer),
        Just(CallOp::Accept),
        Just(CallOp::Decline),
        Just(CallOp::End),
        Just(CallOp::RemoteAnswer),
        Just(CallOp::RemoteIce),
        Just(CallOp::RemoteEnded),
        Just(CallOp::RemoteDeclined),
        Just(CallOp::ConnectionLost),
    ]
}
