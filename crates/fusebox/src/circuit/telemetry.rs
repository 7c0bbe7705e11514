// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::engine::{Rejection, Transition};
use crate::CircuitState;
use crate::utils::TelemetryHelper;

#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_OPENED_EVENT_NAME: &str = "circuit_opened";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_HALF_OPENED_EVENT_NAME: &str = "circuit_half_opened";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_CLOSED_EVENT_NAME: &str = "circuit_closed";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_REJECTED_EVENT_NAME: &str = "circuit_rejected";
#[cfg(any(feature = "metrics", test))]
pub(crate) const BREAKER_TIMEOUT_EVENT_NAME: &str = "breaker_timeout";

#[cfg_attr(
    not(any(feature = "metrics", feature = "logs", test)),
    expect(unused_variables, reason = "unused when neither logs nor metrics are enabled")
)]
pub(super) fn report_transition(telemetry: &TelemetryHelper, transition: Transition) {
    #[cfg(any(feature = "metrics", test))]
    telemetry.report_metrics(
        match transition.to {
            CircuitState::Open => CIRCUIT_OPENED_EVENT_NAME,
            CircuitState::HalfOpen => CIRCUIT_HALF_OPENED_EVENT_NAME,
            CircuitState::Closed => CIRCUIT_CLOSED_EVENT_NAME,
        },
        transition.to,
    );

    #[cfg(any(feature = "logs", test))]
    if telemetry.logs_enabled {
        match transition.to {
            CircuitState::Open => tracing::event!(
                name: "fusebox.circuit.opened",
                tracing::Level::WARN,
                circuit.name = %telemetry.circuit_name,
                circuit.state = transition.to.as_str(),
                circuit.successes = transition.successes,
                circuit.errors = transition.errors,
            ),
            CircuitState::HalfOpen => tracing::event!(
                name: "fusebox.circuit.half_opened",
                tracing::Level::INFO,
                circuit.name = %telemetry.circuit_name,
                circuit.state = transition.to.as_str(),
            ),
            CircuitState::Closed => tracing::event!(
                name: "fusebox.circuit.closed",
                tracing::Level::INFO,
                circuit.name = %telemetry.circuit_name,
                circuit.state = transition.to.as_str(),
                circuit.probes.successful = transition.successes,
            ),
        }
    }
}

#[cfg_attr(
    not(any(feature = "metrics", feature = "logs", test)),
    expect(unused_variables, reason = "unused when neither logs nor metrics are enabled")
)]
pub(super) fn report_rejection(telemetry: &TelemetryHelper, rejection: Rejection) {
    #[cfg(any(feature = "metrics", test))]
    telemetry.report_metrics(CIRCUIT_REJECTED_EVENT_NAME, rejection.state);

    #[cfg(any(feature = "logs", test))]
    if telemetry.logs_enabled {
        let reason = match rejection.state {
            CircuitState::HalfOpen => crate::CircuitErrorKind::RateLimited.as_str(),
            CircuitState::Open | CircuitState::Closed => crate::CircuitErrorKind::Broken.as_str(),
        };

        tracing::event!(
            name: "fusebox.circuit.rejected",
            tracing::Level::WARN,
            circuit.name = %telemetry.circuit_name,
            circuit.state = rejection.state.as_str(),
            circuit.rejection.reason = reason,
            circuit.ttl_ms = u64::try_from(rejection.ttl.as_millis()).unwrap_or(u64::MAX),
        );
    }
}

#[cfg_attr(
    not(any(feature = "metrics", feature = "logs", test)),
    expect(unused_variables, reason = "unused when neither logs nor metrics are enabled")
)]
pub(crate) fn report_timeout(telemetry: &TelemetryHelper, state: CircuitState, timeout: std::time::Duration) {
    #[cfg(any(feature = "metrics", test))]
    telemetry.report_metrics(BREAKER_TIMEOUT_EVENT_NAME, state);

    #[cfg(any(feature = "logs", test))]
    if telemetry.logs_enabled {
        tracing::event!(
            name: "fusebox.breaker.timeout",
            tracing::Level::WARN,
            circuit.name = %telemetry.circuit_name,
            circuit.state = state.as_str(),
            breaker.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        );
    }
}
