// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(any(feature = "metrics", feature = "logs", test))]
use std::borrow::Cow;

/// Telemetry sinks shared by a circuit and the breakers driving it.
#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    #[cfg(any(feature = "metrics", feature = "logs", test))]
    pub(crate) circuit_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    #[cfg(any(feature = "logs", test))]
    pub(crate) logs_enabled: bool,
}

impl TelemetryHelper {
    #[cfg(test)]
    pub(crate) fn metrics_enabled(&self) -> bool {
        self.event_reporter.is_some()
    }

    /// Adds one resilience event with the given attributes, if metrics are enabled.
    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn report_metrics(&self, event_name: &'static str, state: crate::CircuitState) {
        use crate::utils::{CIRCUIT_STATE, EVENT_NAME, STRATEGY_NAME};

        if let Some(reporter) = &self.event_reporter {
            reporter.add(
                1,
                &[
                    opentelemetry::KeyValue::new(STRATEGY_NAME, self.circuit_name.clone()),
                    opentelemetry::KeyValue::new(EVENT_NAME, event_name),
                    opentelemetry::KeyValue::new(CIRCUIT_STATE, state.as_str()),
                ],
            );
        }
    }
}
