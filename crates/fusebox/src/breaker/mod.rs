// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit::Rejection;
use crate::circuit::telemetry::report_timeout;
use crate::utils::define_fn_wrapper;
use crate::{AbortReason, BreakerOptions, CancellationToken, Circuit, CircuitError, CircuitState, ExecError};

mod breakable;

pub use breakable::Breakable;

define_fn_wrapper!(IsBreakable<E>(Fn(error: &ExecError<E>) -> bool));

/// Runs fallible async operations through a [`Circuit`].
///
/// Each call asks the circuit for admission, runs the operation, and reports the outcome. A
/// breaker holds no state of its own beyond its configuration: several breakers, possibly with
/// different timeouts or error filters, can share one circuit to jointly govern a dependency.
///
/// Failures are never swallowed. The operation's own error is returned untouched as
/// [`ExecError::Operation`]; the breaker only adds rejections, timeouts, and the caller's
/// cancellation reason.
///
/// ```
/// # futures::executor::block_on(async {
/// use std::sync::Arc;
/// use fusebox::{Breaker, Circuit, CircuitOptions, ExecError};
///
/// let circuit = Arc::new(Circuit::new(CircuitOptions::new().error_threshold(1_u32)));
/// let breaker = Breaker::<std::io::Error>::new(Arc::clone(&circuit));
///
/// let value = breaker.exec(|_token| async { Ok::<_, std::io::Error>(42) }).await.unwrap();
/// assert_eq!(value, 42);
///
/// let failed = breaker.exec(|_token| async { Err::<u32, _>(std::io::Error::other("down")) }).await;
/// assert!(matches!(failed, Err(ExecError::Operation(_))));
///
/// let rejected = breaker.exec(|_token| async { Ok::<_, std::io::Error>(42) }).await;
/// assert!(rejected.unwrap_err().is_rejected());
/// # });
/// ```
///
/// # Timeouts and cancellation
///
/// With a [`timeout`][Self::timeout] configured, the operation races a timer and fails with
/// [`CircuitErrorKind::TimeoutExceeded`][crate::CircuitErrorKind::TimeoutExceeded] when the timer
/// wins. With [`exec_with_signal`][Self::exec_with_signal], it also races the caller's token and
/// fails with [`ExecError::Aborted`] when that is cancelled first. Either way the token handed to
/// the operation is cancelled; stopping the underlying work is up to the operation.
///
/// Timers use [`tokio::time`], so a breaker with a timeout must run inside a tokio runtime.
pub struct Breaker<E> {
    circuit: Arc<Circuit>,
    timeout: Option<Duration>,
    is_breakable: Option<IsBreakable<E>>,
}

impl<E> Breaker<E> {
    /// Creates a breaker without a timeout that counts every failure against the circuit.
    #[must_use]
    pub fn new(circuit: impl Into<Arc<Circuit>>) -> Self {
        Self {
            circuit: circuit.into(),
            timeout: None,
            is_breakable: None,
        }
    }

    /// Applies options loaded from configuration.
    #[must_use]
    pub fn options(mut self, options: &BreakerOptions) -> Self {
        self.timeout = options.timeout;
        self
    }

    /// Sets the per-call execution timeout. A zero timeout disables it.
    ///
    /// The timeout is also the retry-after hint of
    /// [`RateLimited`][crate::CircuitErrorKind::RateLimited] rejections.
    ///
    /// **Default**: none
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Sets the predicate deciding which failures count against the circuit.
    ///
    /// Failures for which the predicate returns `false`, such as client-side validation errors,
    /// are still returned to the caller but do not move the circuit towards opening.
    ///
    /// **Default**: every failure counts
    #[must_use]
    pub fn is_breakable(mut self, predicate: impl Fn(&ExecError<E>) -> bool + Send + Sync + 'static) -> Self {
        self.is_breakable = Some(IsBreakable::new(predicate));
        self
    }

    /// Returns the circuit this breaker reports to.
    #[must_use]
    pub fn circuit(&self) -> &Arc<Circuit> {
        &self.circuit
    }

    /// Returns the per-call execution timeout, if any.
    #[must_use]
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs `operation` if the circuit admits it and reports the outcome.
    ///
    /// The operation receives a token that is cancelled when the timeout elapses.
    ///
    /// # Errors
    ///
    /// - [`ExecError::Circuit`] when the circuit rejects the call or the timeout elapses.
    /// - [`ExecError::Operation`] with the operation's own error.
    pub async fn exec<T, F, Fut>(&self, operation: F) -> Result<T, ExecError<E>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(operation, None).await
    }

    /// Like [`exec`][Self::exec], and additionally stops waiting once `signal` is cancelled.
    ///
    /// The cancellation reason is forwarded to the operation's token.
    ///
    /// # Errors
    ///
    /// As [`exec`][Self::exec], plus [`ExecError::Aborted`] with the caller's reason when
    /// `signal` is cancelled before the operation settles.
    pub async fn exec_with_signal<T, F, Fut>(&self, operation: F, signal: &CancellationToken) -> Result<T, ExecError<E>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(operation, Some(signal)).await
    }

    /// Wraps `operation` so every call goes through this breaker.
    ///
    /// See [`Breakable`].
    pub fn wrap<F>(&self, operation: F) -> Breakable<F, E> {
        Breakable::new(self.clone(), operation)
    }

    async fn run<T, F, Fut>(&self, operation: F, signal: Option<&CancellationToken>) -> Result<T, ExecError<E>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(rejection) = self.circuit.admit() {
            return Err(self.rejected(rejection).into());
        }

        let admitted = Admitted {
            circuit: Some(self.circuit.as_ref()),
        };
        let token = CancellationToken::new();
        let result = self.settle(operation(token.clone()), &token, signal).await;
        admitted.disarm();

        match result {
            Ok(value) => {
                self.circuit.success();
                Ok(value)
            }
            Err(error) => {
                if self.is_breakable.as_ref().is_none_or(|predicate| predicate.call(&error)) {
                    self.circuit.error();
                }
                Err(error)
            }
        }
    }

    /// Waits for whichever comes first: the caller's cancellation, the timeout, or the operation.
    async fn settle<T, Fut>(&self, operation: Fut, token: &CancellationToken, signal: Option<&CancellationToken>) -> Result<T, ExecError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let aborted = async {
            match signal {
                Some(signal) => signal.cancelled().await,
                None => pending().await,
            }
        };

        let deadline = async {
            match self.timeout {
                Some(timeout) => {
                    tokio::time::sleep(timeout).await;
                    timeout
                }
                None => pending().await,
            }
        };

        tokio::select! {
            biased;

            reason = aborted => {
                token.cancel_with(Arc::clone(&reason));
                Err(ExecError::Aborted(reason))
            }
            timeout = deadline => {
                let reason: AbortReason = Arc::new(CircuitError::timeout_exceeded());
                token.cancel_with(reason);
                report_timeout(self.circuit.telemetry(), self.circuit.state(), timeout);
                Err(CircuitError::timeout_exceeded().into())
            }
            result = operation => result.map_err(ExecError::Operation),
        }
    }

    fn rejected(&self, rejection: Rejection) -> CircuitError {
        match rejection.state {
            CircuitState::HalfOpen => CircuitError::rate_limited(self.timeout.unwrap_or_default()),
            CircuitState::Open | CircuitState::Closed => CircuitError::broken(rejection.ttl),
        }
    }
}

impl<E> Clone for Breaker<E> {
    fn clone(&self) -> Self {
        Self {
            circuit: Arc::clone(&self.circuit),
            timeout: self.timeout,
            is_breakable: self.is_breakable.clone(),
        }
    }
}

impl<E> Debug for Breaker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("circuit", &self.circuit.name())
            .field("timeout", &self.timeout)
            .field("is_breakable", &self.is_breakable)
            .finish()
    }
}

/// Counts an admitted call as an error if its future is dropped before the outcome is known.
struct Admitted<'a> {
    circuit: Option<&'a Circuit>,
}

impl Admitted<'_> {
    fn disarm(mut self) {
        self.circuit = None;
    }
}

impl Drop for Admitted<'_> {
    fn drop(&mut self) {
        if let Some(circuit) = self.circuit.take() {
            circuit.error();
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use static_assertions::assert_impl_all;
    use tokio::time::{Instant, sleep};

    use super::*;
    use crate::{CircuitErrorKind, CircuitOptions};

    assert_impl_all!(Breaker<std::io::Error>: Send, Sync, Clone, Debug);

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        Transient,
        Validation,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            std::fmt::Debug::fmt(self, f)
        }
    }

    fn circuit(options: CircuitOptions) -> Arc<Circuit> {
        Arc::new(Circuit::new(options))
    }

    #[tokio::test]
    async fn success_is_reported() {
        let circuit = circuit(CircuitOptions::new());
        let breaker = Breaker::<TestError>::new(Arc::clone(&circuit));

        let value = breaker.exec(|_| async { Ok(7) }).await.unwrap();

        assert_eq!(value, 7);
        assert_eq!(circuit.success_count(), 1);
    }

    #[tokio::test]
    async fn operation_error_is_passed_through_and_counted() {
        let circuit = circuit(CircuitOptions::new().error_threshold(3_u32));
        let breaker = Breaker::new(Arc::clone(&circuit));

        let error = breaker.exec(|_| async { Err::<(), _>(TestError::Transient) }).await.unwrap_err();

        assert_eq!(error.into_operation(), Some(TestError::Transient));
        assert_eq!(circuit.error_count(), 1);
    }

    #[tokio::test]
    async fn is_breakable_filters_errors() {
        let circuit = circuit(CircuitOptions::new());
        let breaker = Breaker::new(Arc::clone(&circuit))
            .is_breakable(|error| !matches!(error, ExecError::Operation(TestError::Validation)));

        let error = breaker.exec(|_| async { Err::<(), _>(TestError::Validation) }).await.unwrap_err();

        assert_eq!(error.into_operation(), Some(TestError::Validation));
        assert_eq!(circuit.error_count(), 0);
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_rejection_carries_ttl() {
        let circuit = circuit(CircuitOptions::new().reset_timeout(Duration::from_secs(5)));
        let breaker = Breaker::new(Arc::clone(&circuit));
        circuit.error();

        let ran = &AtomicBool::new(false);
        let error = breaker
            .exec(|_| async move {
                ran.store(true, Ordering::Relaxed);
                Ok::<_, TestError>(())
            })
            .await
            .unwrap_err();

        let error = error.as_circuit().unwrap();
        assert_eq!(error.kind(), CircuitErrorKind::Broken);
        assert_eq!(error.retry_after(), Duration::from_secs(5));
        assert!(!ran.load(Ordering::Relaxed));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_rejection_carries_timeout() {
        let circuit = circuit(CircuitOptions::new().state(CircuitState::HalfOpen));
        let breaker = Breaker::<TestError>::new(Arc::clone(&circuit)).timeout(Duration::from_millis(250));
        assert!(circuit.request());

        let error = breaker.exec(|_| async { Ok(()) }).await.unwrap_err();

        let error = error.as_circuit().unwrap();
        assert_eq!(error.kind(), CircuitErrorKind::RateLimited);
        assert_eq!(error.retry_after(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_token_and_counts_error() {
        let circuit = circuit(CircuitOptions::new().error_threshold(2_u32));
        let breaker = Breaker::<TestError>::new(Arc::clone(&circuit)).timeout(Duration::from_millis(100));

        let start = Instant::now();
        let error = breaker.exec(|_| pending::<Result<(), TestError>>()).await.unwrap_err();

        assert!(error.as_circuit().unwrap().is_timeout());
        assert_eq!(start.elapsed(), Duration::from_millis(100));
        assert_eq!(circuit.error_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn operation_token_is_cancelled_on_timeout() {
        let breaker = Breaker::<TestError>::new(Circuit::default()).timeout(Duration::from_millis(10));
        let captured = std::sync::Mutex::new(None);

        let _ = breaker
            .exec(|token| {
                *captured.lock().unwrap() = Some(token);
                pending::<Result<(), TestError>>()
            })
            .await;

        let token = captured.lock().unwrap().take().unwrap();
        assert!(token.is_cancelled());
        assert_eq!(token.reason().unwrap().to_string(), "request timeout exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn fast_operation_beats_timeout() {
        let breaker = Breaker::<TestError>::new(Circuit::default()).timeout(Duration::from_millis(100));

        let value = breaker
            .exec(|_| async {
                sleep(Duration::from_millis(50)).await;
                Ok("done")
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
    }

    #[tokio::test(start_paused = true)]
    async fn caller_signal_aborts() {
        let circuit = circuit(CircuitOptions::new().error_threshold(5_u32));
        let breaker = Breaker::<TestError>::new(Arc::clone(&circuit));
        let signal = CancellationToken::new();
        let captured = std::sync::Mutex::new(None);

        let canceller = {
            let signal = signal.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(20)).await;
                signal.cancel("client went away");
            })
        };

        let error = breaker
            .exec_with_signal(
                |token| {
                    *captured.lock().unwrap() = Some(token);
                    pending::<Result<(), TestError>>()
                },
                &signal,
            )
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(error.is_aborted());
        assert_eq!(error.to_string(), "operation aborted: client went away");
        assert_eq!(circuit.error_count(), 1);

        let token = captured.lock().unwrap().take().unwrap();
        assert_eq!(token.reason().unwrap().to_string(), "client went away");
    }

    #[tokio::test(start_paused = true)]
    async fn abort_can_be_excluded_from_counting() {
        let circuit = circuit(CircuitOptions::new());
        let breaker = Breaker::<TestError>::new(Arc::clone(&circuit)).is_breakable(|error| !error.is_aborted());
        let signal = CancellationToken::new();
        signal.cancel("already gone");

        let error = breaker.exec_with_signal(|_| pending::<Result<(), TestError>>(), &signal).await.unwrap_err();

        assert!(error.is_aborted());
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.error_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn signal_and_timeout_race() {
        let breaker = Breaker::<TestError>::new(Circuit::default()).timeout(Duration::from_millis(30));
        let signal = CancellationToken::new();

        let error = breaker.exec_with_signal(|_| pending::<Result<(), TestError>>(), &signal).await.unwrap_err();

        assert!(error.as_circuit().unwrap().is_timeout());
        assert!(!signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_call_counts_as_error() {
        let circuit = circuit(CircuitOptions::new().error_threshold(2_u32));
        let breaker = Breaker::<TestError>::new(Arc::clone(&circuit));

        tokio::time::timeout(Duration::from_millis(10), breaker.exec(|_| pending::<Result<(), TestError>>()))
            .await
            .unwrap_err();

        assert_eq!(circuit.error_count(), 1);
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn settled_call_is_reported_once() {
        let circuit = circuit(CircuitOptions::new().error_threshold(2_u32));
        let breaker = Breaker::new(Arc::clone(&circuit));

        let _ = breaker.exec(|_| async { Err::<(), _>(TestError::Transient) }).await;
        breaker.exec(|_| async { Ok::<_, TestError>(()) }).await.unwrap();

        assert_eq!((circuit.success_count(), circuit.error_count()), (1, 1));
    }

    #[test]
    fn options_and_zero_timeout() {
        let breaker = Breaker::<TestError>::new(Circuit::default()).options(&BreakerOptions::new().timeout(Duration::from_secs(1)));
        assert_eq!(breaker.timeout_duration(), Some(Duration::from_secs(1)));

        let breaker = breaker.timeout(Duration::ZERO);
        assert_eq!(breaker.timeout_duration(), None);
    }

    #[test]
    fn debug_output() {
        let breaker = Breaker::<TestError>::new(Circuit::builder().name("orders").build()).timeout(Duration::from_secs(1));

        assert_eq!(
            format!("{breaker:?}"),
            "Breaker { circuit: \"orders\", timeout: Some(1s), is_breakable: None }"
        );
    }

    #[test]
    fn runs_without_tokio_runtime_when_no_timeout() {
        let breaker = Breaker::<TestError>::new(Circuit::default());
        let value = futures::executor::block_on(breaker.exec(|_| async { Ok(1) })).unwrap();
        assert_eq!(value, 1);
    }
}
