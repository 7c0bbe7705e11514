// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::CircuitState;

/// A point-in-time snapshot of a circuit.
///
/// The counts cover the current state episode only; every state change starts them from zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize))]
#[non_exhaustive]
pub struct CircuitStats {
    /// The state of the circuit.
    pub state: CircuitState,

    /// Calls admitted as probes within the window. Only half-open circuits count requests.
    pub request_count: u32,

    /// Successful outcomes within the window.
    pub success_count: u32,

    /// Failed outcomes within the window.
    pub error_count: u32,
}

impl CircuitStats {
    #[cfg(test)]
    pub(crate) fn empty(state: CircuitState) -> Self {
        Self {
            state,
            request_count: 0,
            success_count: 0,
            error_count: 0,
        }
    }
}
