// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Smallest window the counters accept; shorter windows are clamped to this value.
pub(crate) const MIN_WINDOW_SIZE: Duration = Duration::from_millis(1);

/// Default counting horizon of the circuit's window counter.
pub(crate) const DEFAULT_WINDOW_SIZE: Duration = Duration::from_secs(30);

/// Default delay before an open circuit lets a probe through.
pub(crate) const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of errors within the window that trips the circuit.
pub(crate) const DEFAULT_ERROR_THRESHOLD: u32 = 1;

/// Default minimum number of outcomes within the window before the circuit can trip.
pub(crate) const DEFAULT_VOLUME_THRESHOLD: u32 = 1;

/// Default number of successful probes required to close a half-open circuit.
pub(crate) const DEFAULT_SUCCESS_THRESHOLD: u32 = 1;

/// Name reported in telemetry for circuits that were not given one.
pub(crate) const DEFAULT_CIRCUIT_NAME: &str = "default";

pub(crate) const ERR_POISONED_LOCK: &str =
    "poisoned lock - cannot continue execution because security and privacy guarantees can no longer be upheld";
