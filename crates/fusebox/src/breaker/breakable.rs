// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};

use super::Breaker;
use crate::ExecError;

/// An async operation bound to a [`Breaker`].
///
/// Created by [`Breaker::wrap`]. Calling it has the shape of the wrapped operation, with the
/// error widened to [`ExecError`], so a guarded client method can be swapped in wherever the
/// bare one was used.
///
/// ```
/// # futures::executor::block_on(async {
/// use fusebox::{Breaker, Circuit};
///
/// async fn lookup(id: u32) -> Result<String, std::io::Error> {
///     Ok(format!("user-{id}"))
/// }
///
/// let breaker = Breaker::new(Circuit::default());
/// let guarded_lookup = breaker.wrap(lookup);
///
/// assert_eq!(guarded_lookup.call(7).await.unwrap(), "user-7");
/// # });
/// ```
pub struct Breakable<F, E> {
    breaker: Breaker<E>,
    operation: F,
}

impl<F, E> Breakable<F, E> {
    pub(super) fn new(breaker: Breaker<E>, operation: F) -> Self {
        Self { breaker, operation }
    }

    /// Runs the wrapped operation with `input` through the breaker.
    ///
    /// # Errors
    ///
    /// See [`Breaker::exec`].
    pub async fn call<In, T, Fut>(&self, input: In) -> Result<T, ExecError<E>>
    where
        F: Fn(In) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.breaker.exec(|_token| (self.operation)(input)).await
    }

    /// Returns the breaker the operation runs through.
    #[must_use]
    pub fn breaker(&self) -> &Breaker<E> {
        &self.breaker
    }
}

impl<F: Clone, E> Clone for Breakable<F, E> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
            operation: self.operation.clone(),
        }
    }
}

impl<F, E> Debug for Breakable<F, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breakable")
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}
