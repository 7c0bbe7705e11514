// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::constants::{
    DEFAULT_RESET_TIMEOUT, DEFAULT_SUCCESS_THRESHOLD, DEFAULT_VOLUME_THRESHOLD, DEFAULT_WINDOW_SIZE, MIN_WINDOW_SIZE,
};
use crate::{CircuitState, ErrorThreshold, WindowKind};

/// Construction-time configuration of a [`Circuit`][crate::Circuit].
///
/// The options are validated once, when the circuit is built, and never re-validated per call.
/// Out-of-range values are clamped rather than rejected.
///
/// | Option | Meaning | Default |
/// |---|---|---|
/// | [`window_size`][Self::window_size] | counting horizon | 30 s |
/// | [`error_threshold`][Self::error_threshold] | errors (≥ 1) or error rate (0, 1) that trip the circuit | `1` |
/// | [`volume_threshold`][Self::volume_threshold] | outcomes required before tripping is possible | `1` |
/// | [`reset_timeout`][Self::reset_timeout] | open → half-open delay | 30 s |
/// | [`success_threshold`][Self::success_threshold] | successful probes that close the circuit; also the probe budget | `1` |
/// | [`state`][Self::state] | initial state | closed |
/// | [`window_kind`][Self::window_kind] | counting algorithm | fixed |
///
/// With the `serde` feature the options deserialize from documents such as
///
/// ```json
/// { "window_size_ms": 10000, "error_threshold": 0.5, "volume_threshold": 20, "window_kind": "sliding" }
/// ```
///
/// where every missing field takes its default.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(default, deny_unknown_fields))]
pub struct CircuitOptions {
    #[cfg_attr(any(feature = "serde", test), serde(rename = "window_size_ms", with = "millis"))]
    pub(crate) window_size: Duration,
    pub(crate) error_threshold: ErrorThreshold,
    pub(crate) volume_threshold: u32,
    #[cfg_attr(any(feature = "serde", test), serde(rename = "reset_timeout_ms", with = "millis"))]
    pub(crate) reset_timeout: Duration,
    pub(crate) success_threshold: u32,
    pub(crate) state: CircuitState,
    pub(crate) window_kind: WindowKind,
}

impl Default for CircuitOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            error_threshold: ErrorThreshold::default(),
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            state: CircuitState::Closed,
            window_kind: WindowKind::Fixed,
        }
    }
}

impl CircuitOptions {
    /// Creates options with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the counting horizon of the window counter.
    ///
    /// Windows shorter than one millisecond are clamped to one millisecond.
    ///
    /// **Default**: 30 seconds
    #[must_use]
    pub fn window_size(mut self, window_size: Duration) -> Self {
        self.window_size = window_size;
        self
    }

    /// Sets the error threshold.
    ///
    /// Accepts either an [`ErrorThreshold`] or a plain number: values at or above `1` are an
    /// absolute error count, values in `(0, 1)` an error rate.
    ///
    /// **Default**: `1` (a single error)
    #[must_use]
    pub fn error_threshold(mut self, error_threshold: impl Into<ErrorThreshold>) -> Self {
        self.error_threshold = error_threshold.into();
        self
    }

    /// Sets the minimum number of outcomes within the window before the circuit can trip.
    ///
    /// **Default**: `1`
    #[must_use]
    pub fn volume_threshold(mut self, volume_threshold: u32) -> Self {
        self.volume_threshold = volume_threshold;
        self
    }

    /// Sets how long the circuit stays open before admitting a probe.
    ///
    /// **Default**: 30 seconds
    #[must_use]
    pub fn reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }

    /// Sets the number of successful probes that close a half-open circuit.
    ///
    /// This is also the number of probes admitted concurrently while half-open. Zero is
    /// treated as one.
    ///
    /// **Default**: `1`
    #[must_use]
    pub fn success_threshold(mut self, success_threshold: u32) -> Self {
        self.success_threshold = success_threshold;
        self
    }

    /// Sets the state the circuit starts in.
    ///
    /// A circuit that starts [`Open`][CircuitState::Open] is immediately eligible to probe.
    ///
    /// **Default**: [`CircuitState::Closed`]
    #[must_use]
    pub fn state(mut self, state: CircuitState) -> Self {
        self.state = state;
        self
    }

    /// Sets the counting algorithm.
    ///
    /// **Default**: [`WindowKind::Fixed`]
    #[must_use]
    pub fn window_kind(mut self, window_kind: WindowKind) -> Self {
        self.window_kind = window_kind;
        self
    }

    /// Returns a copy with every value brought into its valid range.
    pub(crate) fn validated(&self) -> Self {
        Self {
            window_size: self.window_size.max(MIN_WINDOW_SIZE),
            success_threshold: self.success_threshold.max(1),
            error_threshold: self.error_threshold.normalized(),
            ..self.clone()
        }
    }
}

/// Configuration of a [`Breaker`][crate::Breaker] that can be loaded from configuration files.
///
/// ```json
/// { "timeout_ms": 250 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(default, deny_unknown_fields))]
pub struct BreakerOptions {
    #[cfg_attr(any(feature = "serde", test), serde(rename = "timeout_ms", with = "millis_opt"))]
    pub(crate) timeout: Option<Duration>,
}

impl BreakerOptions {
    /// Creates options without a timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call execution timeout. A zero timeout disables it.
    ///
    /// **Default**: none
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

#[cfg(any(feature = "serde", test))]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(any(feature = "serde", test))]
mod millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[expect(clippy::ref_option, reason = "signature required by serde(with)")]
    pub(super) fn serialize<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }
}
