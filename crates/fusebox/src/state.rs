// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// The admission state of a [`Circuit`][crate::Circuit].
///
/// ```text
/// ┌────────┐        error threshold tripped       ┌──────────┐
/// │ Closed │ ────────────────────────────────────▶│   Open   │
/// └────────┘                                      └──────────┘
///      ▲                                            ▲      │
///      │                                 any error  │      │ reset timeout
///      │            ┌────────────────┐              │      │ elapsed
///      └────────────│   Half-Open    │──────────────┘      │
///   success         └────────────────┘◀────────────────────┘
///   threshold reached
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(rename_all = "snake_case"))]
pub enum CircuitState {
    /// Requests are admitted. Switches to [`Open`][Self::Open] once the error threshold trips.
    #[default]
    Closed,

    /// Requests are rejected. Switches to [`HalfOpen`][Self::HalfOpen] after the reset timeout.
    Open,

    /// A limited number of probe requests are admitted. Switches to [`Closed`][Self::Closed]
    /// once the success threshold is reached, or back to [`Open`][Self::Open] on any error.
    HalfOpen,
}

impl CircuitState {
    /// Returns the `snake_case` name used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
