// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::constants::ERR_POISONED_LOCK;
use crate::error::ceil_secs;
use crate::utils::{TelemetryHelper, define_fn_wrapper};
use crate::window::CounterKey;
use crate::{CircuitOptions, CircuitState, WindowKind};

mod builder;
mod engine;
mod stats;
pub(crate) mod telemetry;

pub use builder::CircuitBuilder;
use engine::{Admission, CircuitCore, Transition};
pub(crate) use engine::Rejection;
pub use stats::CircuitStats;

define_fn_wrapper!(OnStateChange(Fn(state: CircuitState)));

/// A circuit breaker state machine.
///
/// The circuit decides whether calls to a downstream dependency are admitted and counts their
/// outcomes within a time window. It starts [`Closed`][CircuitState::Closed], opens once the
/// configured error threshold is reached, and after the reset timeout lets a bounded number of
/// probe calls through while [`HalfOpen`][CircuitState::HalfOpen]. Enough successful probes close
/// it again; a single failed probe re-opens it.
///
/// The circuit is thread-safe. Share it between call sites with an [`Arc`][std::sync::Arc] when
/// they guard the same dependency.
///
/// Most callers drive a circuit through a [`Breaker`][crate::Breaker]. Driving it by hand is a
/// two-phase protocol: ask [`request`][Self::request] for admission, run the call, then report
/// the outcome with [`success`][Self::success] or [`error`][Self::error].
///
/// ```
/// use std::time::Duration;
/// use fusebox::{Circuit, CircuitOptions, CircuitState};
///
/// let circuit = Circuit::new(
///     CircuitOptions::new()
///         .error_threshold(2_u32)
///         .reset_timeout(Duration::from_secs(10)),
/// );
///
/// assert!(circuit.request());
/// circuit.error();
/// assert!(circuit.request());
/// circuit.error();
///
/// assert_eq!(circuit.state(), CircuitState::Open);
/// assert!(!circuit.request());
/// assert_eq!(circuit.max_age(), 10);
/// ```
///
/// # Time
///
/// All timing uses [`tokio::time::Instant`], so tests can drive a circuit with tokio's paused
/// clock. Outside a tokio runtime the system clock is used.
#[derive(Debug)]
pub struct Circuit {
    engine: Mutex<CircuitCore>,
    options: CircuitOptions,
    name: Cow<'static, str>,
    listeners: Mutex<Vec<OnStateChange>>,
    telemetry: TelemetryHelper,
}

impl Circuit {
    /// Creates a circuit counting with the window algorithm selected in `options`.
    #[must_use]
    pub fn new(options: CircuitOptions) -> Self {
        Self::builder().options(options).build()
    }

    /// Creates a circuit counting outcomes in a fixed window.
    #[must_use]
    pub fn fixed(options: CircuitOptions) -> Self {
        Self::new(options.window_kind(WindowKind::Fixed))
    }

    /// Creates a circuit counting outcomes in a sliding window.
    #[must_use]
    pub fn sliding(options: CircuitOptions) -> Self {
        Self::new(options.window_kind(WindowKind::Sliding))
    }

    /// Starts building a circuit with a name, listeners, or telemetry.
    pub fn builder() -> CircuitBuilder {
        CircuitBuilder::new()
    }

    /// Asks for admission of a single call.
    ///
    /// Always `true` while closed. While open, `false` until the reset timeout has elapsed; the
    /// first call after that moves the circuit to half-open and is admitted as the first probe.
    /// While half-open, `true` for at most `success_threshold` probes.
    ///
    /// Every admitted call must be followed by [`success`][Self::success] or
    /// [`error`][Self::error].
    pub fn request(&self) -> bool {
        self.admit().is_ok()
    }

    /// Reports a successful call.
    ///
    /// Ignored while open. While half-open, the call that reaches `success_threshold` closes
    /// the circuit.
    pub fn success(&self) {
        let now = Instant::now();
        let transition = self.engine.lock().expect(ERR_POISONED_LOCK).success(now, &self.options);

        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Reports a failed call.
    ///
    /// Ignored while open. While closed, opens the circuit once the error threshold is reached.
    /// While half-open, opens the circuit immediately.
    pub fn error(&self) {
        let now = Instant::now();
        let transition = self.engine.lock().expect(ERR_POISONED_LOCK).error(now, &self.options);

        if let Some(transition) = transition {
            self.notify(transition);
        }
    }

    /// Returns the current state.
    ///
    /// An open circuit keeps reporting [`Open`][CircuitState::Open] after its reset timeout
    /// elapses, until the next [`request`][Self::request] moves it to half-open.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.engine.lock().expect(ERR_POISONED_LOCK).state()
    }

    /// Returns a snapshot of the state and of the counts within the current window.
    #[must_use]
    pub fn stats(&self) -> CircuitStats {
        let now = Instant::now();
        self.engine.lock().expect(ERR_POISONED_LOCK).stats(now)
    }

    /// Returns the number of probes admitted within the current window.
    #[must_use]
    pub fn request_count(&self) -> u32 {
        self.count(CounterKey::Request)
    }

    /// Returns the number of successes within the current window.
    #[must_use]
    pub fn success_count(&self) -> u32 {
        self.count(CounterKey::Success)
    }

    /// Returns the number of errors within the current window.
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.count(CounterKey::Error)
    }

    /// Returns the instant the open circuit becomes eligible for a probe; `None` unless open.
    #[must_use]
    pub fn expiry(&self) -> Option<Instant> {
        self.engine.lock().expect(ERR_POISONED_LOCK).expiry()
    }

    /// Returns the time left until the open circuit admits a probe; zero unless open.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        let now = Instant::now();
        self.engine.lock().expect(ERR_POISONED_LOCK).ttl(now)
    }

    /// Returns [`ttl`][Self::ttl] in whole seconds, rounded up.
    ///
    /// Suitable for a `Retry-After` or `Cache-Control: max-age` header.
    #[must_use]
    pub fn max_age(&self) -> u64 {
        ceil_secs(self.ttl())
    }

    /// Returns the name reported in logs and metrics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the validated options the circuit was built with.
    #[must_use]
    pub fn options(&self) -> &CircuitOptions {
        &self.options
    }

    /// Returns the counting algorithm of the circuit.
    #[must_use]
    pub fn window_kind(&self) -> WindowKind {
        self.options.window_kind
    }

    /// Registers a listener called with the new state after every state change.
    ///
    /// Listeners run synchronously on the thread that caused the change, after the counters
    /// were reset and without any lock held, so they may call back into the circuit.
    pub fn on_state_change(&self, listener: impl Fn(CircuitState) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .expect(ERR_POISONED_LOCK)
            .push(OnStateChange::new(listener));
    }

    pub(crate) fn admit(&self) -> Result<(), Rejection> {
        let now = Instant::now();
        let admission = self.engine.lock().expect(ERR_POISONED_LOCK).request(now, &self.options);

        match admission {
            Admission::Accepted { transition } => {
                if let Some(transition) = transition {
                    self.notify(transition);
                }
                Ok(())
            }
            Admission::Rejected(rejection) => {
                telemetry::report_rejection(&self.telemetry, rejection);
                Err(rejection)
            }
        }
    }

    pub(crate) fn telemetry(&self) -> &TelemetryHelper {
        &self.telemetry
    }

    fn count(&self, key: CounterKey) -> u32 {
        let now = Instant::now();
        self.engine.lock().expect(ERR_POISONED_LOCK).count(key, now)
    }

    fn notify(&self, transition: Transition) {
        telemetry::report_transition(&self.telemetry, transition);

        let listeners = self.listeners.lock().expect(ERR_POISONED_LOCK).clone();
        for listener in &listeners {
            listener.call(transition.to);
        }
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new(CircuitOptions::default())
    }
}
