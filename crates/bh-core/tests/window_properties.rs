//! Property-based tests for the ring and sliding window invariants.
//!
//! The sliding counter trades exactness for bounded memory by capping its
//! buckets at `min(interval, count)` distinct seconds. The reference model
//! here reproduces that cap with a plain Vec, so any divergence in the
//! ring-backed implementation shows up over arbitrary non-decreasing
//! timestamp sequences.

use bh_core::ring::SlotRing;
use bh_core::window::SlidingCount;
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use std::collections::VecDeque;

/// Naive Vec-backed model of the capped sliding counter.
struct ReferenceWindow {
    buckets: Vec<(i64, u32)>,
    interval: i64,
    capacity: usize,
}

impl ReferenceWindow {
    fn new(interval: u32, count: u32) -> Self {
        ReferenceWindow {
            buckets: Vec::new(),
            interval: i64::from(interval),
            capacity: interval.min(count).max(1) as usize,
        }
    }

    fn observe(&mut self, at: i64) -> u32 {
        if let Some(last) = self.buckets.last_mut() {
            if last.0 == at {
                last.1 += 1;
                return self.total();
            }
        }
        let deadline = at - self.interval;
        while let Some(&(second, _)) = self.buckets.first() {
            if second > deadline {
                break;
            }
            self.buckets.remove(0);
        }
        if self.buckets.len() == self.capacity {
            self.buckets.remove(0);
        }
        self.buckets.push((at, 1));
        self.total()
    }

    fn total(&self) -> u32 {
        self.buckets.iter().map(|&(_, hits)| hits).sum()
    }
}

proptest! {
    #[test]
    fn sliding_count_matches_reference_model(
        interval in 1u32..=50,
        count in 1u32..=20,
        start in 0i64..=1_000,
        deltas in vec(0i64..=4, 0..120),
    ) {
        let mut window = SlidingCount::new(interval, count);
        let mut reference = ReferenceWindow::new(interval, count);
        let mut at = start;
        for delta in deltas {
            at += delta;
            let got = window.observe(at).expect("timestamps are non-decreasing");
            let want = reference.observe(at);
            prop_assert_eq!(got, want, "diverged at second {}", at);
        }
    }

    #[test]
    fn windowed_count_never_exceeds_hits_in_window(
        interval in 1u32..=20,
        count in 2u32..=10,
        deltas in vec(0i64..=3, 1..80),
    ) {
        let mut window = SlidingCount::new(interval, count);
        let mut seconds = Vec::new();
        let mut at = 0i64;
        for delta in deltas {
            at += delta;
            seconds.push(at);
            let got = window.observe(at).expect("timestamps are non-decreasing");
            // Never more than the uncapped window contents.
            let uncapped = seconds
                .iter()
                .filter(|&&second| second > at - i64::from(interval))
                .count() as u32;
            prop_assert!(got <= uncapped);
            prop_assert!(got >= 1);
        }
    }

    #[test]
    fn ring_matches_deque_model(
        size in 1usize..=8,
        // Some(v) pushes, None pops.
        ops in vec(option::of(0i32..100), 0..60),
    ) {
        let mut ring = SlotRing::new(size);
        let mut model: VecDeque<i32> = VecDeque::new();
        for op in ops {
            match op {
                Some(value) => {
                    let evicted = ring.push(value);
                    let expected = if model.len() == size {
                        model.pop_front()
                    } else {
                        None
                    };
                    model.push_back(value);
                    prop_assert_eq!(evicted, expected);
                }
                None => {
                    prop_assert_eq!(ring.pop(), model.pop_front());
                }
            }
            prop_assert!(ring.len() <= size);
            prop_assert_eq!(ring.len(), model.len());
            prop_assert_eq!(ring.is_full(), model.len() == size);
            let contents: Vec<i32> = ring.iter().copied().collect();
            let expected: Vec<i32> = model.iter().copied().collect();
            prop_assert_eq!(contents, expected);
        }
    }
}
