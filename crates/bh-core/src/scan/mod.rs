//! Per-key burst scanning over a capture source.
//!
//! The scanner pulls events from an [`EventSource`], derives a grouping
//! key per event, and drives one sliding window per key. Each key is a
//! two-state machine: it enters a burst when its windowed count reaches
//! the configured threshold, and the burst is emitted when the count falls
//! back below it. Emitting on the falling edge gives the evidence ring the
//! maximum opportunity to accumulate context. Groups still in burst when
//! the source ends are flushed, sorted by key.
//!
//! Any error is fatal to the owning scanner only: the source is released,
//! the scanner turns terminal, and bursts already emitted stand.

pub mod burst;
pub mod key;
pub mod reader;

pub use burst::{Burst, Evidence};
pub use key::{FieldKey, KeyError, KeyFn};
pub use reader::{CapturedEvent, EventRecord, EventSource, JsonlSource, ReadError};

use crate::config::ScanConfig;
use crate::ring::SlotRing;
use crate::window::{SlidingCount, WindowError};
use std::collections::HashMap;
use thiserror::Error;

/// Evidence rings hold this many times the burst threshold, so a report
/// carries context beyond the counted window.
pub const EVIDENCE_FACTOR: u32 = 10;

/// Errors that stop a scanner.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The capture failed to produce an event.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// The key predicate failed on an event.
    #[error("failed to derive key for event #{seq}: {source}")]
    Key {
        seq: u64,
        #[source]
        source: KeyError,
    },

    /// The capture broke the non-decreasing timestamp contract. This is a
    /// broken contract upstream, not an input error.
    #[error("event #{seq} breaks timestamp ordering: {source}")]
    OutOfOrder {
        seq: u64,
        #[source]
        source: WindowError,
    },
}

/// Scanner lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Events are still being pulled or flushed.
    Running,
    /// The source ended and every open group was flushed.
    Exhausted,
    /// A fatal error stopped the scanner.
    Failed,
}

/// State for a single grouping key.
struct Group {
    window: SlidingCount,
    evidence: SlotRing<Evidence>,
    in_burst: bool,
}

impl Group {
    fn new(config: &ScanConfig) -> Self {
        Group {
            window: SlidingCount::new(config.interval, config.count),
            evidence: SlotRing::new((EVIDENCE_FACTOR * config.count) as usize),
            in_burst: false,
        }
    }

    fn into_burst(mut self, key: String) -> Burst {
        let mut events = Vec::with_capacity(self.evidence.len());
        while let Some(evidence) = self.evidence.pop() {
            events.push(evidence);
        }
        Burst { key, events }
    }
}

/// Streams bursts out of one capture source.
///
/// One scanner owns one source, one key predicate and one key→group map;
/// nothing is shared, so scanners for different sources can run on
/// independent threads without locking.
pub struct Scanner<S, K> {
    source: Option<S>,
    key_fn: K,
    config: ScanConfig,
    groups: HashMap<String, Group>,
    /// Keys still to flush after exhaustion, sorted, drained from the back.
    flush: Vec<String>,
    state: ScanState,
}

impl<S: EventSource, K: KeyFn> Scanner<S, K> {
    /// Create a scanner. `config` must already be validated.
    pub fn new(source: S, key_fn: K, config: ScanConfig) -> Self {
        Scanner {
            source: Some(source),
            key_fn,
            config,
            groups: HashMap::new(),
            flush: Vec::new(),
            state: ScanState::Running,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Advance until the next completed burst.
    ///
    /// Returns `Ok(None)` once the source is exhausted and every group
    /// still in burst has been flushed. After an error the scanner is
    /// terminal; further calls return `Ok(None)`.
    pub fn next_burst(&mut self) -> Result<Option<Burst>, ScanError> {
        if self.state == ScanState::Failed {
            return Ok(None);
        }
        match self.advance() {
            Ok(Some(burst)) => Ok(Some(burst)),
            Ok(None) => {
                self.state = ScanState::Exhausted;
                Ok(None)
            }
            Err(err) => {
                // Release the source on the error path too; exactly once.
                self.source = None;
                self.state = ScanState::Failed;
                Err(err)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<Burst>, ScanError> {
        while let Some(source) = self.source.as_mut() {
            let Some(event) = source.next_event()? else {
                // Source exhausted: release it early and queue the open
                // groups for a deterministic flush.
                self.source = None;
                let mut keys: Vec<String> = self.groups.keys().cloned().collect();
                keys.sort_unstable();
                keys.reverse();
                self.flush = keys;
                break;
            };
            let seq = event.seq;
            let key = match self.key_fn.key_for(&event.record) {
                Ok(Some(key)) => key,
                Ok(None) => continue,
                Err(source) => return Err(ScanError::Key { seq, source }),
            };
            let at_second = event.record.ts;
            let config = &self.config;
            let group = self
                .groups
                .entry(key.clone())
                .or_insert_with(|| Group::new(config));
            group.evidence.push(Evidence {
                seq,
                record: event.record,
            });
            let count = group
                .window
                .observe(at_second)
                .map_err(|source| ScanError::OutOfOrder { seq, source })?;
            let was_in_burst = group.in_burst;
            if !was_in_burst && count >= self.config.count {
                group.in_burst = true;
            }
            if was_in_burst && count < self.config.count {
                // Falling edge: the burst just closed.
                if let Some(closed) = self.groups.remove(&key) {
                    return Ok(Some(closed.into_burst(key)));
                }
            }
        }
        // Source drained; yield the groups that were still in burst.
        while let Some(key) = self.flush.pop() {
            if let Some(group) = self.groups.remove(&key) {
                if group.in_burst {
                    return Ok(Some(group.into_burst(key)));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    /// In-memory event source for scanner tests.
    struct VecSource {
        events: std::vec::IntoIter<Result<CapturedEvent, ReadError>>,
    }

    impl VecSource {
        fn new(events: Vec<Result<CapturedEvent, ReadError>>) -> Self {
            VecSource {
                events: events.into_iter(),
            }
        }
    }

    impl EventSource for VecSource {
        fn next_event(&mut self) -> Result<Option<CapturedEvent>, ReadError> {
            self.events.next().transpose()
        }
    }

    fn event(seq: u64, ts: i64, key: &str) -> Result<CapturedEvent, ReadError> {
        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), json!(key));
        Ok(CapturedEvent {
            seq,
            record: EventRecord { ts, fields },
        })
    }

    fn key_field(record: &EventRecord) -> Result<Option<String>, KeyError> {
        Ok(record
            .fields
            .get("key")
            .and_then(|value| value.as_str())
            .filter(|key| !key.is_empty())
            .map(str::to_owned))
    }

    fn config(interval: u32, count: u32) -> ScanConfig {
        ScanConfig { interval, count }
    }

    fn scanner(
        events: Vec<Result<CapturedEvent, ReadError>>,
        interval: u32,
        count: u32,
    ) -> Scanner<VecSource, fn(&EventRecord) -> Result<Option<String>, KeyError>> {
        Scanner::new(VecSource::new(events), key_field, config(interval, count))
    }

    #[test]
    fn emits_on_the_falling_edge_only() {
        // Three events reach the threshold at second 10-11; the event at
        // second 20 drops the window below it and closes the burst.
        let mut scanner = scanner(
            vec![
                event(1, 10, "A-B"),
                event(2, 10, "A-B"),
                event(3, 11, "A-B"),
                event(4, 20, "A-B"),
            ],
            5,
            2,
        );
        let burst = scanner.next_burst().unwrap().expect("one burst");
        assert_eq!(burst.key, "A-B");
        assert_eq!(burst.sequence_numbers().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(burst.first_timestamp(), Some(10));
        assert_eq!(burst.last_timestamp(), Some(20));
        assert!(scanner.next_burst().unwrap().is_none());
        assert_eq!(scanner.state(), ScanState::Exhausted);
    }

    #[test]
    fn below_threshold_emits_nothing() {
        let mut scanner = scanner(vec![event(1, 10, "A-B"), event(2, 30, "A-B")], 10, 2);
        assert!(scanner.next_burst().unwrap().is_none());
        assert_eq!(scanner.state(), ScanState::Exhausted);
    }

    #[test]
    fn flushes_open_bursts_at_end_of_stream() {
        let mut scanner = scanner(
            vec![event(1, 10, "A-B"), event(2, 10, "A-B"), event(3, 11, "A-B")],
            10,
            2,
        );
        let burst = scanner.next_burst().unwrap().expect("flushed burst");
        assert_eq!(burst.key, "A-B");
        assert_eq!(burst.sequence_numbers().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(scanner.next_burst().unwrap().is_none());
    }

    #[test]
    fn flush_is_sorted_by_key() {
        let mut scanner = scanner(
            vec![
                event(1, 10, "b"),
                event(2, 10, "b"),
                event(3, 10, "a"),
                event(4, 10, "a"),
                event(5, 10, "c"),
            ],
            10,
            2,
        );
        let first = scanner.next_burst().unwrap().expect("first flush");
        let second = scanner.next_burst().unwrap().expect("second flush");
        assert_eq!(first.key, "a");
        assert_eq!(second.key, "b");
        // "c" never reached the threshold: discarded without emission.
        assert!(scanner.next_burst().unwrap().is_none());
    }

    #[test]
    fn uninteresting_events_are_not_counted_or_stored() {
        let mut scanner = scanner(
            vec![
                event(1, 10, "A-B"),
                event(2, 10, ""),
                event(3, 10, "A-B"),
                event(4, 30, "A-B"),
            ],
            10,
            2,
        );
        let burst = scanner.next_burst().unwrap().expect("one burst");
        assert_eq!(burst.sequence_numbers().collect::<Vec<_>>(), vec![1, 3, 4]);
    }

    #[test]
    fn keys_are_windowed_independently() {
        let mut scanner = scanner(
            vec![
                event(1, 10, "a"),
                event(2, 10, "b"),
                event(3, 10, "a"),
                event(4, 11, "b"),
                // close both windows
                event(5, 40, "a"),
                event(6, 40, "b"),
            ],
            10,
            2,
        );
        let first = scanner.next_burst().unwrap().expect("burst for a");
        assert_eq!(first.key, "a");
        assert_eq!(first.sequence_numbers().collect::<Vec<_>>(), vec![1, 3, 5]);
        let second = scanner.next_burst().unwrap().expect("burst for b");
        assert_eq!(second.key, "b");
        assert_eq!(second.sequence_numbers().collect::<Vec<_>>(), vec![2, 4, 6]);
        assert!(scanner.next_burst().unwrap().is_none());
    }

    #[test]
    fn evidence_is_capped_at_the_ring_capacity() {
        let count = 2;
        let capacity = (EVIDENCE_FACTOR * count) as u64;
        let mut events = Vec::new();
        // Far more same-second events than the evidence ring can hold.
        for seq in 1..=capacity + 5 {
            events.push(event(seq, 10, "hot"));
        }
        events.push(event(capacity + 6, 40, "hot"));
        let mut scanner = scanner(events, 10, count);
        let burst = scanner.next_burst().unwrap().expect("one burst");
        assert_eq!(burst.events.len() as u64, capacity);
        // Oldest evidence was silently evicted: 26 pushes through a
        // 20-slot ring leave sequence numbers 7..=26.
        assert_eq!(burst.sequence_numbers().next(), Some(7));
        assert_eq!(burst.sequence_numbers().last(), Some(capacity + 6));
    }

    #[test]
    fn read_error_fails_the_scanner() {
        let decode = serde_json::from_str::<EventRecord>("not json").unwrap_err();
        let mut scanner = scanner(
            vec![
                event(1, 10, "A-B"),
                Err(ReadError::Decode {
                    seq: 2,
                    source: decode,
                }),
                event(3, 10, "A-B"),
            ],
            10,
            2,
        );
        let err = scanner.next_burst().unwrap_err();
        assert!(matches!(err, ScanError::Read(ReadError::Decode { seq: 2, .. })));
        assert_eq!(scanner.state(), ScanState::Failed);
        // Terminal: no further events are processed.
        assert!(scanner.next_burst().unwrap().is_none());
    }

    #[test]
    fn predicate_error_fails_the_scanner() {
        let bad_key = |_: &EventRecord| -> Result<Option<String>, KeyError> {
            Err(KeyError::NonScalarField {
                field: "src".into(),
            })
        };
        let mut scanner = Scanner::new(
            VecSource::new(vec![event(1, 10, "A-B")]),
            bad_key,
            config(10, 2),
        );
        let err = scanner.next_burst().unwrap_err();
        assert!(matches!(err, ScanError::Key { seq: 1, .. }));
        assert_eq!(scanner.state(), ScanState::Failed);
    }

    #[test]
    fn out_of_order_timestamps_are_a_contract_error() {
        let mut scanner = scanner(
            vec![event(1, 20, "A-B"), event(2, 10, "A-B")],
            10,
            2,
        );
        let err = scanner.next_burst().unwrap_err();
        assert!(matches!(err, ScanError::OutOfOrder { seq: 2, .. }));
        assert_eq!(scanner.state(), ScanState::Failed);
    }

    #[test]
    fn no_emission_for_a_closed_then_quiet_key() {
        // After a burst closes its group is forgotten; the closing event
        // alone must not seed a new burst at flush time.
        let mut scanner = scanner(
            vec![
                event(1, 10, "A-B"),
                event(2, 10, "A-B"),
                event(3, 40, "A-B"),
            ],
            10,
            2,
        );
        let burst = scanner.next_burst().unwrap().expect("closed burst");
        assert_eq!(burst.sequence_numbers().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(scanner.next_burst().unwrap().is_none());
        assert_eq!(scanner.state(), ScanState::Exhausted);
    }
}
