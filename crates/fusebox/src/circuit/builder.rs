// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Mutex;

use tokio::time::Instant;

use super::engine::CircuitCore;
use super::{Circuit, OnStateChange};
use crate::constants::DEFAULT_CIRCUIT_NAME;
use crate::utils::TelemetryHelper;
use crate::{CircuitOptions, CircuitState};

/// Builds a [`Circuit`] with a name, state-change listeners, and telemetry.
///
/// ```
/// use fusebox::{Circuit, CircuitOptions, CircuitState};
///
/// let circuit = Circuit::builder()
///     .name("inventory_api")
///     .options(CircuitOptions::new().volume_threshold(10).error_threshold(0.5))
///     .on_state_change(|state| println!("inventory_api is now {state}"))
///     .build();
///
/// assert_eq!(circuit.name(), "inventory_api");
/// assert_eq!(circuit.state(), CircuitState::Closed);
/// ```
#[derive(Debug)]
#[must_use]
pub struct CircuitBuilder {
    options: CircuitOptions,
    name: Cow<'static, str>,
    listeners: Vec<OnStateChange>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
}

impl CircuitBuilder {
    pub(super) fn new() -> Self {
        Self {
            options: CircuitOptions::default(),
            name: Cow::Borrowed(DEFAULT_CIRCUIT_NAME),
            listeners: Vec::new(),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            #[cfg(any(feature = "logs", test))]
            logs_enabled: false,
        }
    }

    /// Sets the options of the circuit.
    ///
    /// **Default**: [`CircuitOptions::default`]
    pub fn options(mut self, options: CircuitOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the name reported in logs and metrics. Prefer `snake_case`.
    ///
    /// **Default**: `default`
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a listener called with the new state after every state change.
    ///
    /// See [`Circuit::on_state_change`].
    pub fn on_state_change(mut self, listener: impl Fn(CircuitState) + Send + Sync + 'static) -> Self {
        self.listeners.push(OnStateChange::new(listener));
        self
    }

    /// Reports state changes, rejections, and timeouts as `resilience.event` metrics.
    #[cfg(any(feature = "metrics", test))]
    pub fn enable_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(crate::metrics::create_meter(provider)),
            ..self
        }
    }

    /// Emits structured `tracing` events for state changes, rejections, and timeouts.
    #[cfg(any(feature = "logs", test))]
    pub fn enable_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// Builds the circuit, validating its options.
    #[must_use]
    pub fn build(self) -> Circuit {
        let options = self.options.validated();

        let telemetry = TelemetryHelper {
            #[cfg(any(feature = "metrics", feature = "logs", test))]
            circuit_name: self.name.clone(),
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(crate::metrics::create_resilience_event_counter),
            #[cfg(any(feature = "logs", test))]
            logs_enabled: self.logs_enabled,
        };

        Circuit {
            engine: Mutex::new(CircuitCore::new(&options, Instant::now())),
            options,
            name: self.name,
            listeners: Mutex::new(self.listeners),
            telemetry,
        }
    }
}
