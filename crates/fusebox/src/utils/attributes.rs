// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Key used to annotate the name of the circuit reporting an event.
///
/// Values reported under this dimension should be short and concise, preferably in `snake_case`.
/// Examples: `payments_api`, `user_store`.
pub(crate) const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Key used to annotate the specific resilience event being emitted.
///
/// Examples: `circuit_opened`, `breaker_timeout`.
pub(crate) const EVENT_NAME: &str = "resilience.event.name";

/// Key used to annotate the circuit state at the time of the event.
pub(crate) const CIRCUIT_STATE: &str = "resilience.circuit.state";
