// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The reason an operation was cancelled by its caller.
///
/// Cheap to clone; the same reason is handed to the operation's token and returned to the caller.
pub type AbortReason = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The kind of a [`CircuitError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CircuitErrorKind {
    /// The circuit is open and not yet eligible to let a probe through.
    Broken,

    /// The circuit is half-open and all probe slots are taken.
    RateLimited,

    /// The operation did not settle within the breaker's timeout.
    TimeoutExceeded,
}

impl CircuitErrorKind {
    /// Returns the `snake_case` name used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Broken => "broken",
            Self::RateLimited => "rate_limited",
            Self::TimeoutExceeded => "timeout_exceeded",
        }
    }
}

impl fmt::Display for CircuitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Broken => "circuit broken",
            Self::RateLimited => "request rate limit exceeded",
            Self::TimeoutExceeded => "request timeout exceeded",
        })
    }
}

/// An error produced by the circuit breaker itself rather than by the wrapped operation.
///
/// Rejections carry a retry-after hint that callers can surface to their own clients, for
/// example as an HTTP `Retry-After` header.
///
/// ```
/// use std::time::Duration;
/// use fusebox::{CircuitError, CircuitErrorKind};
///
/// let error = CircuitError::broken(Duration::from_millis(1500));
/// assert_eq!(error.kind(), CircuitErrorKind::Broken);
/// assert_eq!(error.retry_after_secs(), 2);
/// assert_eq!(error.to_string(), "circuit broken");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct CircuitError {
    kind: CircuitErrorKind,
    retry_after: Duration,
}

impl CircuitError {
    /// Creates an error for a call rejected by an open circuit.
    #[must_use]
    pub fn broken(retry_after: Duration) -> Self {
        Self {
            kind: CircuitErrorKind::Broken,
            retry_after,
        }
    }

    /// Creates an error for a call rejected because the half-open probe budget is exhausted.
    #[must_use]
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self {
            kind: CircuitErrorKind::RateLimited,
            retry_after,
        }
    }

    /// Creates an error for a call that did not settle in time.
    #[must_use]
    pub fn timeout_exceeded() -> Self {
        Self {
            kind: CircuitErrorKind::TimeoutExceeded,
            retry_after: Duration::ZERO,
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> CircuitErrorKind {
        self.kind
    }

    /// Returns how long the caller should wait before trying again.
    ///
    /// Zero for [`TimeoutExceeded`][CircuitErrorKind::TimeoutExceeded].
    #[must_use]
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// Returns [`retry_after`][Self::retry_after] in whole seconds, rounded up.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        ceil_secs(self.retry_after)
    }

    /// Returns `true` if the call was rejected by an open circuit.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.kind == CircuitErrorKind::Broken
    }

    /// Returns `true` if the call was rejected by a saturated half-open circuit.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.kind == CircuitErrorKind::RateLimited
    }

    /// Returns `true` if the call timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == CircuitErrorKind::TimeoutExceeded
    }
}

/// The error returned by [`Breaker::exec`][crate::Breaker::exec].
///
/// The wrapped operation's own failure is passed through untouched as
/// [`Operation`][Self::Operation]; the breaker only adds its own rejections and timeouts, and the
/// caller's cancellation reason.
#[derive(Debug, thiserror::Error)]
pub enum ExecError<E> {
    /// The breaker rejected the call or timed it out.
    #[error(transparent)]
    Circuit(#[from] CircuitError),

    /// The caller cancelled the call before it settled.
    #[error("operation aborted: {0}")]
    Aborted(AbortReason),

    /// The operation itself failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> ExecError<E> {
    /// Returns the circuit error, if the breaker produced this error.
    #[must_use]
    pub fn as_circuit(&self) -> Option<&CircuitError> {
        match self {
            Self::Circuit(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the operation's error, if the operation produced this error.
    #[must_use]
    pub fn as_operation(&self) -> Option<&E> {
        match self {
            Self::Operation(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the operation's error, if the operation produced this error.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            _ => None,
        }
    }

    /// Returns `true` if the caller cancelled the call.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Returns `true` if the breaker rejected the call without running it.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.as_circuit().is_some_and(|e| e.is_broken() || e.is_rate_limited())
    }
}

pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 { secs + 1 } else { secs }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(CircuitError: Send, Sync, std::error::Error);
    assert_impl_all!(ExecError<std::io::Error>: Send, Sync, std::error::Error);

    #[test]
    fn messages() {
        assert_eq!(CircuitError::broken(Duration::ZERO).to_string(), "circuit broken");
        assert_eq!(CircuitError::rate_limited(Duration::ZERO).to_string(), "request rate limit exceeded");
        assert_eq!(CircuitError::timeout_exceeded().to_string(), "request timeout exceeded");
    }

    #[test]
    fn predicates() {
        let broken = CircuitError::broken(Duration::from_secs(1));
        assert!(broken.is_broken());
        assert!(!broken.is_rate_limited());
        assert!(!broken.is_timeout());
        assert_eq!(broken.retry_after(), Duration::from_secs(1));

        let limited = CircuitError::rate_limited(Duration::from_millis(100));
        assert!(limited.is_rate_limited());
        assert_eq!(limited.kind(), CircuitErrorKind::RateLimited);

        let timeout = CircuitError::timeout_exceeded();
        assert!(timeout.is_timeout());
        assert_eq!(timeout.retry_after(), Duration::ZERO);
    }

    #[test]
    fn kind_as_str() {
        assert_eq!(CircuitErrorKind::Broken.as_str(), "broken");
        assert_eq!(CircuitErrorKind::RateLimited.as_str(), "rate_limited");
        assert_eq!(CircuitErrorKind::TimeoutExceeded.as_str(), "timeout_exceeded");
    }

    #[test]
    fn retry_after_secs_rounds_up() {
        assert_eq!(CircuitError::broken(Duration::ZERO).retry_after_secs(), 0);
        assert_eq!(CircuitError::broken(Duration::from_millis(1)).retry_after_secs(), 1);
        assert_eq!(CircuitError::broken(Duration::from_millis(1000)).retry_after_secs(), 1);
        assert_eq!(CircuitError::broken(Duration::from_millis(1001)).retry_after_secs(), 2);
    }

    #[test]
    fn exec_error_passes_operation_error_through() {
        let error: ExecError<std::io::Error> = ExecError::Operation(std::io::Error::other("boom"));

        assert_eq!(error.to_string(), "boom");
        assert!(error.as_circuit().is_none());
        assert!(!error.is_rejected());
        assert_eq!(error.into_operation().unwrap().to_string(), "boom");
    }

    #[test]
    fn exec_error_from_circuit_error() {
        let error: ExecError<std::io::Error> = CircuitError::broken(Duration::ZERO).into();

        assert!(error.is_rejected());
        assert!(error.as_operation().is_none());
        assert_eq!(error.to_string(), "circuit broken");
    }

    #[test]
    fn exec_error_aborted() {
        let reason: AbortReason = Arc::new(std::io::Error::other("cancelled by user"));
        let error: ExecError<std::io::Error> = ExecError::Aborted(reason);

        assert!(error.is_aborted());
        assert!(!error.is_rejected());
        assert_eq!(error.to_string(), "operation aborted: cancelled by user");
    }
}
