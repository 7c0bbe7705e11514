// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tokio::time::Instant;

use super::{CounterKey, Counts, WindowCounter, locate};
use crate::constants::MIN_WINDOW_SIZE;

/// Fixed window counter.
///
/// Holds a single bucket valid for `[origin + index * size, origin + (index + 1) * size)`.
/// The bucket is cleared the first time it is touched after the window has rolled over.
#[derive(Debug)]
pub(crate) struct FixedWindow {
    size: Duration,
    origin: Instant,
    index: u128,
    counts: Counts,
}

impl FixedWindow {
    pub fn new(size: Duration, origin: Instant) -> Self {
        Self {
            size: size.max(MIN_WINDOW_SIZE),
            origin,
            index: 0,
            counts: Counts::default(),
        }
    }
}

impl WindowCounter for FixedWindow {
    fn increment(&mut self, key: CounterKey, now: Instant) {
        self.reconcile(now);
        self.counts.increment(key);
    }

    fn get(&mut self, key: CounterKey, now: Instant) -> u32 {
        self.reconcile(now);
        self.counts.get(key)
    }

    fn reconcile(&mut self, now: Instant) {
        let (index, _) = locate(self.origin, self.size, now);

        if index > self.index {
            self.index = index;
            self.counts = Counts::default();
        }
    }

    fn reset(&mut self) {
        self.counts = Counts::default();
    }
}
