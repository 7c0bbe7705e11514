// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Circuit breaking for fallible async operations.
//!
//! A [`Circuit`] watches the outcomes of calls to a dependency and stops admitting new calls
//! once too many of them fail. After a cool-down it lets a few probe calls through and closes
//! again when they succeed. Outcomes are counted in a time window, either a [fixed][WindowKind::Fixed]
//! one that resets at each boundary or a [sliding][WindowKind::Sliding] one that also weighs in the
//! part of the previous window still overlapping the trailing `window_size`.
//!
//! A [`Breaker`] runs operations through a circuit. It asks for admission, applies an optional
//! timeout, honors caller cancellation, and reports the outcome. Its errors are an [`ExecError`],
//! which keeps the operation's own error apart from the breaker's [`CircuitError`].
//!
//! # Quick Start
//!
//! ```
//! # futures::executor::block_on(async {
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use fusebox::{Breaker, Circuit, CircuitOptions, CircuitState, ExecError};
//!
//! let circuit = Arc::new(Circuit::new(
//!     CircuitOptions::new()
//!         .error_threshold(0.5)
//!         .volume_threshold(4)
//!         .reset_timeout(Duration::from_secs(10)),
//! ));
//!
//! let breaker = Breaker::<std::io::Error>::new(Arc::clone(&circuit));
//!
//! for _ in 0..4 {
//!     let _ = breaker.exec(|_token| async { Err::<(), _>(std::io::Error::other("refused")) }).await;
//! }
//! assert_eq!(circuit.state(), CircuitState::Open);
//!
//! match breaker.exec(|_token| async { Ok::<_, std::io::Error>("ok") }).await {
//!     Err(ExecError::Circuit(error)) => println!("try again in {}s", error.retry_after_secs()),
//!     other => panic!("unexpected {other:?}"),
//! }
//! # });
//! ```
//!
//! # Circuits without a breaker
//!
//! [`Circuit::request`], [`Circuit::success`], and [`Circuit::error`] can be driven directly
//! when the call is made by code the breaker cannot wrap.
//!
//! ```
//! use fusebox::Circuit;
//!
//! let circuit = Circuit::default();
//!
//! if circuit.request() {
//!     circuit.error();
//! }
//!
//! assert!(!circuit.request());
//! ```
//!
//! ## Features
//!
//! - `serde`: Loads [`CircuitOptions`] and [`BreakerOptions`] from configuration and serializes
//!   [`CircuitStats`].
//! - `logs`: Emits `tracing` events for state changes, rejections, and timeouts when enabled
//!   with `CircuitBuilder::enable_logs`.
//! - `metrics`: Reports the same events as the OpenTelemetry `resilience.event` counter when
//!   enabled with `CircuitBuilder::enable_metrics`.
//! - `tower-service`: Adds the `tower` module with a layer that puts a breaker in front of
//!   any tower service.

mod breaker;
mod cancellation;
mod circuit;
mod constants;
mod error;
mod options;
mod state;
mod threshold;
mod utils;
mod window;

#[cfg(any(feature = "metrics", test))]
mod metrics;

#[cfg_attr(docsrs, doc(cfg(feature = "tower-service")))]
#[cfg(any(feature = "tower-service", test))]
pub mod tower;

pub use breaker::{Breakable, Breaker};
pub use cancellation::CancellationToken;
pub use circuit::{Circuit, CircuitBuilder, CircuitStats};
pub use error::{AbortReason, CircuitError, CircuitErrorKind, ExecError};
pub use options::{BreakerOptions, CircuitOptions};
pub use state::CircuitState;
pub use threshold::{ErrorThreshold, tripped};
pub use window::WindowKind;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;
