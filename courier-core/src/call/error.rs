// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Call Signaling Error Types

use thiserror::Error;

use super::session::CallState;

/// Rejected call-control operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// A call session already exists.
    #[error("a call is already active ({0:?})")]
    AlreadyActive(CallState),

    /// The operation needs an active call.
    #[error("no active call")]
    NoActiveCall,

    /// The active call is in the wrong state for the operation.
    #[error("invalid call state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        /// State the operation requires.
        expected: CallState,
        /// State the call is in.
        actual: CallState,
    },

    /// The awaited session was destroyed.
    #[error("call session ended")]
    SessionEnded,

    /// Waiting for the call to connect timed out.
    #[error("timed out waiting for the call to connect")]
    Timeout,
}
