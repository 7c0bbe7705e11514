// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;

use crate::AbortReason;

/// A cooperative cancellation token.
///
/// Clones share the same state: cancelling any clone cancels all of them. Cancellation
/// happens at most once and the first reason wins.
///
/// [`Breaker`][crate::Breaker] hands a fresh token to every operation it runs and cancels it
/// when the timeout elapses or when the caller's own token is cancelled. Cancellation is purely
/// advisory; an operation that spawned work elsewhere must observe the token to stop it.
///
/// ```
/// use fusebox::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
///
/// token.cancel("shutting down");
///
/// assert!(observer.is_cancelled());
/// assert_eq!(observer.reason().unwrap().to_string(), "shutting down");
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    reason: OnceLock<AbortReason>,
    notify: Notify,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token with the given reason.
    ///
    /// Returns `false` if the token was already cancelled; the original reason is kept.
    pub fn cancel(&self, reason: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> bool {
        self.cancel_with(Arc::from(reason.into()))
    }

    pub(crate) fn cancel_with(&self, reason: AbortReason) -> bool {
        let cancelled = self.inner.reason.set(reason).is_ok();

        if cancelled {
            self.inner.notify.notify_waiters();
        }

        cancelled
    }

    /// Returns `true` once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.reason.get().is_some()
    }

    /// Returns the cancellation reason, if the token has been cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<AbortReason> {
        self.inner.reason.get().cloned()
    }

    /// Waits until the token is cancelled and returns the reason.
    pub async fn cancelled(&self) -> AbortReason {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);

            // register interest before checking so a concurrent cancel cannot be missed
            notified.as_mut().enable();

            if let Some(reason) = self.reason() {
                return reason;
            }

            notified.await;
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
