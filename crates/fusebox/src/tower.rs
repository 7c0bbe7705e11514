// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! [`tower`](https://docs.rs/tower) integration.
//!
//! [`BreakerLayer`] wraps any [`Service`] so every request runs through a [`Breaker`]. The
//! service's error becomes [`ExecError`], which tells rejections and timeouts apart from the
//! inner service's own failures.
//!
//! ```
//! # futures::executor::block_on(async {
//! use fusebox::tower::BreakerLayer;
//! use fusebox::{Breaker, Circuit};
//! use tower::{Layer, ServiceExt, service_fn};
//!
//! let echo = service_fn(|request: String| async move { Ok::<_, std::io::Error>(request) });
//! let service = BreakerLayer::new(Breaker::<std::io::Error>::new(Circuit::default())).layer(echo);
//!
//! let response = service.oneshot("ping".to_string()).await.unwrap();
//! assert_eq!(response, "ping");
//! # });
//! ```

use std::fmt::{self, Debug};
use std::pin::Pin;
use std::task::{Context, Poll};

use tower_layer::Layer;
use tower_service::Service;

use crate::{Breaker, ExecError};

/// Applies a [`Breaker`] to a tower service.
pub struct BreakerLayer<E> {
    breaker: Breaker<E>,
}

impl<E> BreakerLayer<E> {
    /// Creates a layer running requests through `breaker`.
    #[must_use]
    pub fn new(breaker: Breaker<E>) -> Self {
        Self { breaker }
    }
}

impl<S, E> Layer<S> for BreakerLayer<E> {
    type Service = BreakerService<S, E>;

    fn layer(&self, inner: S) -> Self::Service {
        BreakerService {
            inner,
            breaker: self.breaker.clone(),
        }
    }
}

impl<E> Clone for BreakerLayer<E> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
        }
    }
}

impl<E> Debug for BreakerLayer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerLayer").field("breaker", &self.breaker).finish()
    }
}

/// A tower service guarded by a [`Breaker`]. Created by [`BreakerLayer`].
pub struct BreakerService<S, E> {
    inner: S,
    breaker: Breaker<E>,
}

impl<S: Clone, E> Clone for BreakerService<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: self.breaker.clone(),
        }
    }
}

impl<S: Debug, E> Debug for BreakerService<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerService")
            .field("inner", &self.inner)
            .field("breaker", &self.breaker)
            .finish()
    }
}

/// Future returned by [`BreakerService`].
pub struct BreakerFuture<Out> {
    inner: Pin<Box<dyn Future<Output = Out> + Send>>,
}

impl<Out> Debug for BreakerFuture<Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerFuture").finish_non_exhaustive()
    }
}

impl<Out> Future for BreakerFuture<Out> {
    type Output = Out;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<S, Req, E> Service<Req> for BreakerService<S, E>
where
    S: Service<Req, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Send + 'static,
    E: Send + 'static,
{
    type Response = S::Response;
    type Error = ExecError<E>;
    type Future = BreakerFuture<Result<S::Response, ExecError<E>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // readiness failures are not outcomes of a call and do not count against the circuit
        self.inner.poll_ready(cx).map_err(ExecError::Operation)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // take the service that was driven to readiness and leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let breaker = self.breaker.clone();

        BreakerFuture {
            inner: Box::pin(async move { breaker.exec(|_token| inner.call(req)).await }),
        }
    }
}
