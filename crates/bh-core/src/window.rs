//! Sliding time-window occurrence counter.
//!
//! [`SlidingCount`] counts how many observations fell within the trailing
//! `interval` seconds, bucketing hits by second. Buckets live in a circular
//! buffer capped at `min(interval, count)` slots: the caller only ever asks
//! whether the windowed count reached `count`, so retaining more distinct
//! seconds than that buys nothing. The cap trades exactness for bounded
//! memory; when the ring is still full after interval-based eviction, the
//! oldest bucket is sacrificed.
//!
//! Observations must arrive with non-decreasing timestamps; a decreasing
//! timestamp is a broken caller contract, reported as
//! [`WindowError::TimeRegression`].

use crate::ring::Ring;
use thiserror::Error;

/// Errors from the sliding window counter.
#[derive(Debug, Error)]
pub enum WindowError {
    /// Timestamps fed to [`SlidingCount::observe`] must never decrease.
    #[error("time went backwards: at second {at}, after {last}")]
    TimeRegression { last: i64, at: i64 },
}

/// One second's worth of aggregated hits.
#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    second: i64,
    hits: u32,
}

/// Counts occurrences within the trailing `interval` seconds.
#[derive(Debug, Clone)]
pub struct SlidingCount {
    ring: Ring,
    buckets: Box<[Bucket]>,
    interval: i64,
    /// Memoized slot of the most recently written bucket.
    head: usize,
    /// Sum of hits over the retained buckets.
    accum: u32,
}

impl SlidingCount {
    /// Create a counter for a window of `interval` seconds, tracking bursts
    /// up to `count` occurrences long.
    pub fn new(interval: u32, count: u32) -> Self {
        let capacity = interval.min(count).max(1) as usize;
        let mut ring = Ring::new(capacity);
        let buckets = vec![Bucket::default(); capacity].into_boxed_slice();
        // Seed the first bucket so `observe` always has a last second to
        // compare against.
        let head = ring.advance_head();
        SlidingCount {
            ring,
            buckets,
            interval: i64::from(interval),
            head,
            accum: 0,
        }
    }

    /// Record one occurrence at `at_second` and return the windowed count.
    ///
    /// `at_second` must be non-decreasing across calls.
    pub fn observe(&mut self, at_second: i64) -> Result<u32, WindowError> {
        let last_second = self.buckets[self.head].second;
        if at_second < last_second {
            return Err(WindowError::TimeRegression {
                last: last_second,
                at: at_second,
            });
        }
        if at_second == last_second {
            // Accumulate in the current second
            self.buckets[self.head].hits += 1;
            self.accum += 1;
            return Ok(self.accum);
        }
        // Entering a new second: first drop the buckets that fell out of
        // the window, oldest first.
        let deadline = at_second - self.interval;
        for slot in self.ring.offsets() {
            if self.buckets[slot].second > deadline {
                break;
            }
            self.accum -= self.buckets[slot].hits;
            self.ring.advance_tail();
        }
        // Still full: the window spans more seconds than we track, so
        // sacrifice the oldest bucket to stay within capacity.
        if self.ring.is_full() {
            if let Some(slot) = self.ring.advance_tail() {
                self.accum -= self.buckets[slot].hits;
            }
        }
        self.head = self.ring.advance_head();
        self.buckets[self.head] = Bucket {
            second: at_second,
            hits: 1,
        };
        self.accum += 1;
        Ok(self.accum)
    }

    /// The current windowed count, as of the last observation.
    pub fn windowed(&self) -> u32 {
        self.accum
    }
}
