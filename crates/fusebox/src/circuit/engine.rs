// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tokio::time::Instant;

use super::CircuitStats;
use crate::window::{CounterKey, Window, WindowCounter};
use crate::{CircuitOptions, CircuitState};

/// Used when `now + reset_timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The mutable part of a circuit, always accessed under the circuit's lock.
///
/// Every method takes `now` explicitly so the state machine can be driven without a clock.
#[derive(Debug)]
pub(super) struct CircuitCore {
    phase: Phase,
    window: Window,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Closed,
    Open { expiry: Instant },
    HalfOpen,
}

impl Phase {
    fn state(self) -> CircuitState {
        match self {
            Self::Closed => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen => CircuitState::HalfOpen,
        }
    }
}

/// The result of asking the circuit to admit a call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) enum Admission {
    /// The call may proceed. `transition` is set when admitting it moved the circuit to half-open.
    Accepted { transition: Option<Transition> },

    /// The call must not proceed.
    Rejected(Rejection),
}

/// Why a call was refused, captured atomically with the refusal itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Rejection {
    /// [`Open`][CircuitState::Open] for a broken circuit, [`HalfOpen`][CircuitState::HalfOpen] when
    /// the probe budget is exhausted.
    pub state: CircuitState,

    /// Time left until the open circuit admits a probe; zero when half-open.
    pub ttl: Duration,
}

/// A state change, with the outcome counts of the episode that just ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) struct Transition {
    pub to: CircuitState,
    pub successes: u32,
    pub errors: u32,
}

impl CircuitCore {
    pub fn new(options: &CircuitOptions, now: Instant) -> Self {
        let phase = match options.state {
            CircuitState::Closed => Phase::Closed,
            // eligible for a probe right away
            CircuitState::Open => Phase::Open { expiry: now },
            CircuitState::HalfOpen => Phase::HalfOpen,
        };

        Self {
            phase,
            window: Window::new(options.window_kind, options.window_size, now),
        }
    }

    pub fn request(&mut self, now: Instant, options: &CircuitOptions) -> Admission {
        match self.phase {
            Phase::Closed => Admission::Accepted { transition: None },
            Phase::Open { expiry } if now < expiry => Admission::Rejected(Rejection {
                state: CircuitState::Open,
                ttl: expiry - now,
            }),
            Phase::Open { .. } => {
                let transition = self.transition(Phase::HalfOpen, now);

                // the call that moved the circuit is the first probe
                self.window.increment(CounterKey::Request, now);

                Admission::Accepted {
                    transition: Some(transition),
                }
            }
            Phase::HalfOpen => {
                if self.window.get(CounterKey::Request, now) >= options.success_threshold {
                    Admission::Rejected(Rejection {
                        state: CircuitState::HalfOpen,
                        ttl: Duration::ZERO,
                    })
                } else {
                    self.window.increment(CounterKey::Request, now);
                    Admission::Accepted { transition: None }
                }
            }
        }
    }

    pub fn success(&mut self, now: Instant, options: &CircuitOptions) -> Option<Transition> {
        match self.phase {
            // a late report from a call admitted before the circuit opened
            Phase::Open { .. } => None,
            Phase::Closed => {
                self.window.increment(CounterKey::Success, now);
                None
            }
            Phase::HalfOpen => {
                self.window.increment(CounterKey::Success, now);

                (self.window.get(CounterKey::Success, now) >= options.success_threshold)
                    .then(|| self.transition(Phase::Closed, now))
            }
        }
    }

    pub fn error(&mut self, now: Instant, options: &CircuitOptions) -> Option<Transition> {
        match self.phase {
            Phase::Open { .. } => None,
            Phase::Closed => {
                self.window.increment(CounterKey::Error, now);

                let successes = self.window.get(CounterKey::Success, now);
                let errors = self.window.get(CounterKey::Error, now);

                options
                    .error_threshold
                    .tripped(options.volume_threshold, successes, errors)
                    .then(|| self.open(now, options))
            }
            // any failed probe is disqualifying
            Phase::HalfOpen => {
                self.window.increment(CounterKey::Error, now);
                Some(self.open(now, options))
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.phase.state()
    }

    pub fn stats(&mut self, now: Instant) -> CircuitStats {
        CircuitStats {
            state: self.phase.state(),
            request_count: self.window.get(CounterKey::Request, now),
            success_count: self.window.get(CounterKey::Success, now),
            error_count: self.window.get(CounterKey::Error, now),
        }
    }

    pub fn count(&mut self, key: CounterKey, now: Instant) -> u32 {
        self.window.get(key, now)
    }

    pub fn expiry(&self) -> Option<Instant> {
        match self.phase {
            Phase::Open { expiry } => Some(expiry),
            Phase::Closed | Phase::HalfOpen => None,
        }
    }

    pub fn ttl(&self, now: Instant) -> Duration {
        self.expiry()
            .map_or(Duration::ZERO, |expiry| expiry.saturating_duration_since(now))
    }

    fn open(&mut self, now: Instant, options: &CircuitOptions) -> Transition {
        let expiry = now
            .checked_add(options.reset_timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);

        self.transition(Phase::Open { expiry }, now)
    }

    /// Moves to `phase` and starts a fresh counting episode.
    fn transition(&mut self, phase: Phase, now: Instant) -> Transition {
        let transition = Transition {
            to: phase.state(),
            successes: self.window.get(CounterKey::Success, now),
            errors: self.window.get(CounterKey::Error, now),
        };

        self.phase = phase;
        self.window.reset();

        transition
    }
}
