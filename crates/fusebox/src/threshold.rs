// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// The error threshold that trips a closed circuit.
///
/// A threshold is either an absolute number of errors within the window, or the fraction of
/// errors among all outcomes within the window. Converting from `f64` follows the usual
/// configuration convention: values in the open interval `(0, 1)` are rates, everything else
/// is a count.
///
/// ```
/// use fusebox::ErrorThreshold;
///
/// assert_eq!(ErrorThreshold::from(3.0), ErrorThreshold::Count(3));
/// assert_eq!(ErrorThreshold::from(0.25), ErrorThreshold::Rate(0.25));
/// ```
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ErrorThreshold {
    /// Trips once the number of errors reaches this count.
    Count(u32),

    /// Trips once the share of errors among all outcomes reaches this rate.
    Rate(f64),
}

impl ErrorThreshold {
    /// Returns `true` when the given outcome counts trip the circuit.
    ///
    /// Nothing trips before `volume_threshold` outcomes have been observed.
    #[must_use]
    pub fn tripped(self, volume_threshold: u32, successes: u32, errors: u32) -> bool {
        let total = successes.saturating_add(errors);

        if total == 0 || total < volume_threshold {
            return false;
        }

        match self {
            Self::Count(count) => errors >= count,
            Self::Rate(rate) => f64::from(errors) / f64::from(total) >= rate,
        }
    }

    /// Returns the threshold as the `f64` it would be configured with.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Count(count) => f64::from(count),
            Self::Rate(rate) => rate,
        }
    }

    /// Maps a rate outside `(0, 1)` to the count it would have been configured as.
    pub(crate) fn normalized(self) -> Self {
        match self {
            Self::Rate(rate) => Self::from(rate),
            count @ Self::Count(_) => count,
        }
    }
}

impl Default for ErrorThreshold {
    fn default() -> Self {
        Self::Count(crate::constants::DEFAULT_ERROR_THRESHOLD)
    }
}

impl From<u32> for ErrorThreshold {
    fn from(count: u32) -> Self {
        Self::Count(count)
    }
}

impl From<f64> for ErrorThreshold {
    fn from(value: f64) -> Self {
        if value > 0.0 && value < 1.0 {
            return Self::Rate(value);
        }

        // NaN and negative values degrade to a zero count, which trips on the first counted error.
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "value is non-negative and saturates at u32::MAX"
        )]
        let count = if value.is_nan() { 0 } else { value.max(0.0).ceil().min(f64::from(u32::MAX)) as u32 };

        Self::Count(count)
    }
}

#[cfg(any(feature = "serde", test))]
impl serde::Serialize for ErrorThreshold {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

#[cfg(any(feature = "serde", test))]
impl<'de> serde::Deserialize<'de> for ErrorThreshold {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self::from)
    }
}

/// Decides whether the error rate has tripped the breaker.
///
/// `error_threshold` at or above `1` is an absolute error count, values in `(0, 1)` are an
/// error rate. In both modes nothing trips until `successes + errors` reaches `volume_threshold`.
///
/// ```
/// use fusebox::tripped;
///
/// // absolute: two errors among at least one outcome
/// assert!(tripped(2.0, 1, 2, 2));
/// assert!(!tripped(2.0, 1, 2, 1));
///
/// // rate: half of at least three outcomes
/// assert!(!tripped(0.5, 3, 2, 1));
/// assert!(tripped(0.5, 3, 2, 2));
/// ```
#[must_use]
pub fn tripped(error_threshold: f64, volume_threshold: u32, successes: u32, errors: u32) -> bool {
    ErrorThreshold::from(error_threshold).tripped(volume_threshold, successes, errors)
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1.0, ErrorThreshold::Count(1))]
    #[case(2.0, ErrorThreshold::Count(2))]
    #[case(2.5, ErrorThreshold::Count(3))]
    #[case(0.5, ErrorThreshold::Rate(0.5))]
    #[case(0.01, ErrorThreshold::Rate(0.01))]
    #[case(0.0, ErrorThreshold::Count(0))]
    #[case(-4.0, ErrorThreshold::Count(0))]
    #[case(f64::NAN, ErrorThreshold::Count(0))]
    fn from_f64(#[case] value: f64, #[case] expected: ErrorThreshold) {
        assert_eq!(ErrorThreshold::from(value), expected);
    }

    #[test]
    fn default_is_single_error() {
        assert_eq!(ErrorThreshold::default(), ErrorThreshold::Count(1));
    }

    #[test]
    fn count_requires_volume() {
        let threshold = ErrorThreshold::Count(1);

        assert!(!threshold.tripped(5, 0, 4));
        assert!(threshold.tripped(5, 0, 5));
        assert!(threshold.tripped(5, 4, 1));
    }

    #[test]
    fn count_boundaries() {
        let threshold = ErrorThreshold::Count(2);

        assert!(!threshold.tripped(1, 2, 1));
        assert!(threshold.tripped(1, 2, 2));
        assert!(threshold.tripped(1, 0, 3));
    }

    #[test]
    fn rate_boundaries() {
        let threshold = ErrorThreshold::Rate(0.5);

        // 1/3 is below the rate
        assert!(!threshold.tripped(3, 2, 1));
        // 2/4 is exactly the rate
        assert!(threshold.tripped(3, 2, 2));
        // enough rate, not enough volume
        assert!(!threshold.tripped(3, 0, 2));
    }

    #[test]
    fn no_outcomes_never_trip() {
        assert!(!ErrorThreshold::Count(0).tripped(0, 0, 0));
        assert!(!ErrorThreshold::Rate(0.1).tripped(0, 0, 0));
    }

    #[test]
    fn zero_volume_trips_on_first_error() {
        assert!(ErrorThreshold::Count(1).tripped(0, 0, 1));
        assert!(ErrorThreshold::Rate(0.5).tripped(0, 0, 1));
    }

    #[test]
    fn saturating_total() {
        assert!(ErrorThreshold::Count(1).tripped(u32::MAX, u32::MAX, 1));
    }

    #[test]
    fn free_function_matches_enum() {
        assert!(tripped(2.0, 1, 2, 2));
        assert!(!tripped(0.5, 3, 2, 1));
        assert!(tripped(0.5, 3, 2, 2));
    }

    #[test]
    fn serde_round_trips_through_f64() {
        let threshold: ErrorThreshold = serde_json::from_str("0.25").unwrap();
        assert_eq!(threshold, ErrorThreshold::Rate(0.25));

        let threshold: ErrorThreshold = serde_json::from_str("4").unwrap();
        assert_eq!(threshold, ErrorThreshold::Count(4));

        assert_eq!(serde_json::to_string(&ErrorThreshold::Count(4)).unwrap(), "4.0");
    }
}
