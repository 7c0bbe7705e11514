// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time-windowed outcome counters.
//!
//! Both counters reconcile lazily: every read and write first rolls the buckets forward to
//! the window containing `now`. There are no background timers to start or stop, and the
//! counters are plain functions of the instants they are given.

use std::time::Duration;

use tokio::time::Instant;

mod fixed;
mod sliding;

pub(crate) use fixed::FixedWindow;
pub(crate) use sliding::SlidingWindow;

/// The label an occurrence is counted under.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) enum CounterKey {
    Request,
    Success,
    Error,
}

impl CounterKey {
    const fn index(self) -> usize {
        match self {
            Self::Request => 0,
            Self::Success => 1,
            Self::Error => 2,
        }
    }
}

/// Per-key counts of a single bucket.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Counts([u32; 3]);

impl Counts {
    pub fn get(&self, key: CounterKey) -> u32 {
        self.0[key.index()]
    }

    pub fn increment(&mut self, key: CounterKey) {
        let slot = &mut self.0[key.index()];
        *slot = slot.saturating_add(1);
    }
}

/// Selects the counting algorithm a circuit uses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(any(feature = "serde", test), derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(any(feature = "serde", test), serde(rename_all = "snake_case"))]
pub enum WindowKind {
    /// A single bucket that is cleared whenever the window rolls over.
    ///
    /// A burst straddling a boundary can be split across two windows, so the aggregate rate
    /// over the horizon may be up to twice what a single window reports.
    #[default]
    Fixed,

    /// Two buckets; reads blend the previous bucket in proportion to how much of it still
    /// overlaps the trailing horizon, so counts decay smoothly across boundaries.
    Sliding,
}

/// Operations shared by the window counters.
///
/// Every operation that observes time takes `now` explicitly and reconciles the buckets first.
pub(crate) trait WindowCounter {
    /// Counts one occurrence of `key`.
    fn increment(&mut self, key: CounterKey, now: Instant);

    /// Returns the number of occurrences of `key` within the trailing window.
    fn get(&mut self, key: CounterKey, now: Instant) -> u32;

    /// Rolls the buckets forward to the window containing `now`.
    fn reconcile(&mut self, now: Instant);

    /// Clears all counts immediately.
    fn reset(&mut self);
}

/// The counter owned by a circuit; one of the two window algorithms.
#[derive(Debug)]
pub(crate) enum Window {
    Fixed(FixedWindow),
    Sliding(SlidingWindow),
}

impl Window {
    pub fn new(kind: WindowKind, size: Duration, origin: Instant) -> Self {
        match kind {
            WindowKind::Fixed => Self::Fixed(FixedWindow::new(size, origin)),
            WindowKind::Sliding => Self::Sliding(SlidingWindow::new(size, origin)),
        }
    }

    #[cfg(test)]
    pub fn kind(&self) -> WindowKind {
        match self {
            Self::Fixed(_) => WindowKind::Fixed,
            Self::Sliding(_) => WindowKind::Sliding,
        }
    }
}

impl WindowCounter for Window {
    fn increment(&mut self, key: CounterKey, now: Instant) {
        match self {
            Self::Fixed(w) => w.increment(key, now),
            Self::Sliding(w) => w.increment(key, now),
        }
    }

    fn get(&mut self, key: CounterKey, now: Instant) -> u32 {
        match self {
            Self::Fixed(w) => w.get(key, now),
            Self::Sliding(w) => w.get(key, now),
        }
    }

    fn reconcile(&mut self, now: Instant) {
        match self {
            Self::Fixed(w) => w.reconcile(now),
            Self::Sliding(w) => w.reconcile(now),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Fixed(w) => w.reset(),
            Self::Sliding(w) => w.reset(),
        }
    }
}

/// Splits the time elapsed since `origin` into a window index and the offset into that window.
fn locate(origin: Instant, size: Duration, now: Instant) -> (u128, u128) {
    let elapsed = now.saturating_duration_since(origin).as_nanos();
    let size = size.as_nanos().max(1);
    (elapsed / size, elapsed % size)
}
