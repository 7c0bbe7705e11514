// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tokio::time::Instant;

use super::{CounterKey, Counts, WindowCounter, locate};
use crate::constants::MIN_WINDOW_SIZE;

/// Sliding window counter.
///
/// Keeps the bucket of the current window and of the window right before it. A read returns
/// `current + floor(previous * remaining / size)`, where `remaining` is the part of the
/// trailing horizon that still overlaps the previous window.
#[derive(Debug)]
pub(crate) struct SlidingWindow {
    size: Duration,
    origin: Instant,
    index: u128,
    previous: Counts,
    current: Counts,
}

impl SlidingWindow {
    pub fn new(size: Duration, origin: Instant) -> Self {
        Self {
            size: size.max(MIN_WINDOW_SIZE),
            origin,
            index: 0,
            previous: Counts::default(),
            current: Counts::default(),
        }
    }
}

impl WindowCounter for SlidingWindow {
    fn increment(&mut self, key: CounterKey, now: Instant) {
        self.reconcile(now);
        self.current.increment(key);
    }

    fn get(&mut self, key: CounterKey, now: Instant) -> u32 {
        self.reconcile(now);

        let current = self.current.get(key);
        let previous = self.previous.get(key);

        if previous == 0 {
            return current;
        }

        let size = self.size.as_nanos();
        let (_, offset) = locate(self.origin, self.size, now);
        let remaining = size - offset;

        // floor(previous * remaining / size); never exceeds `previous`, so it fits in u32
        let carried = u32::try_from(u128::from(previous) * remaining / size).unwrap_or(previous);

        current.saturating_add(carried)
    }

    fn reconcile(&mut self, now: Instant) {
        let (index, _) = locate(self.origin, self.size, now);

        if index > self.index {
            // only the window right before the current one still overlaps the horizon
            self.previous = if index == self.index + 1 {
                self.current
            } else {
                Counts::default()
            };
            self.current = Counts::default();
            self.index = index;
        }
    }

    fn reset(&mut self) {
        self.previous = Counts::default();
        self.current = Counts::default();
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: Duration = Duration::from_secs(10);

    fn window_with_errors(start: Instant, errors: u32) -> SlidingWindow {
        let mut window = SlidingWindow::new(SIZE, start);
        for _ in 0..errors {
            window.increment(CounterKey::Error, start);
        }
        window
    }

    #[test]
    fn new_clamps_zero_size() {
        let window = SlidingWindow::new(Duration::ZERO, Instant::now());
        assert_eq!(window.size, MIN_WINDOW_SIZE);
    }

    #[test]
    fn no_previous_window_contributes_nothing() {
        let start = Instant::now();
        let mut window = window_with_errors(start, 4);

        assert_eq!(window.get(CounterKey::Error, start + Duration::from_secs(9)), 4);
        assert_eq!(window.get(CounterKey::Success, start + Duration::from_secs(9)), 0);
    }

    #[test]
    fn previous_window_is_blended() {
        let start = Instant::now();
        let mut window = window_with_errors(start, 10);

        // right at the boundary the whole previous window is still owed
        assert_eq!(window.get(CounterKey::Error, start + SIZE), 10);
        // a quarter into the next window three quarters remain
        assert_eq!(window.get(CounterKey::Error, start + SIZE + Duration::from_millis(2_500)), 7);
        // floor semantics
        assert_eq!(window.get(CounterKey::Error, start + SIZE + Duration::from_millis(9_999)), 0);
        // the previous window drops out entirely once two windows passed
        assert_eq!(window.get(CounterKey::Error, start + SIZE * 2), 0);
    }

    #[test]
    fn blended_with_current_counts() {
        let start = Instant::now();
        let mut window = window_with_errors(start, 4);

        let now = start + SIZE + Duration::from_secs(5);
        window.increment(CounterKey::Error, now);
        window.increment(CounterKey::Error, now);

        // 2 current + floor(4 * 0.5)
        assert_eq!(window.get(CounterKey::Error, now), 4);
    }

    #[test]
    fn continuous_across_boundary() {
        let start = Instant::now();
        let mut window = window_with_errors(start, 100);

        let before = window.get(CounterKey::Error, start + SIZE - Duration::from_millis(1));
        let at = window.get(CounterKey::Error, start + SIZE);
        let after = window.get(CounterKey::Error, start + SIZE + Duration::from_millis(100));

        assert_eq!(before, 100);
        assert_eq!(at, 100);
        assert_eq!(after, 99);
    }

    #[test]
    fn stale_previous_window_is_discarded() {
        let start = Instant::now();
        let mut window = window_with_errors(start, 8);

        // jump over a whole window without touching the counter
        let now = start + SIZE * 2 + Duration::from_secs(1);
        window.increment(CounterKey::Error, now);

        assert_eq!(window.get(CounterKey::Error, now), 1);
        assert_eq!(window.previous, Counts::default());
    }

    #[test]
    fn reset_clears_both_buckets() {
        let start = Instant::now();
        let mut window = window_with_errors(start, 8);
        window.reconcile(start + SIZE);
        window.increment(CounterKey::Success, start + SIZE);

        window.reset();

        assert_eq!(window.get(CounterKey::Error, start + SIZE), 0);
        assert_eq!(window.get(CounterKey::Success, start + SIZE), 0);
    }

    #[test]
    fn converges_to_fixed_when_window_is_large() {
        let start = Instant::now();
        let mut window = SlidingWindow::new(Duration::from_secs(3_600), start);

        for _ in 0..5 {
            window.increment(CounterKey::Success, start);
        }

        assert_eq!(window.get(CounterKey::Success, start + Duration::from_secs(60)), 5);
    }
}
