//! Completed burst snapshots.

use super::reader::EventRecord;
use chrono::{LocalResult, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

/// One retained piece of evidence: an event and its capture position.
#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub seq: u64,
    pub record: EventRecord,
}

/// A completed burst: the evidence retained for one grouping key, oldest
/// to newest.
///
/// Bursts are immutable snapshots; the scanner hands them to the caller
/// and keeps nothing.
#[derive(Debug, Clone, Serialize)]
pub struct Burst {
    pub key: String,
    pub events: Vec<Evidence>,
}

impl Burst {
    /// Timestamp of the oldest retained event.
    pub fn first_timestamp(&self) -> Option<i64> {
        self.events.first().map(|evidence| evidence.record.ts)
    }

    /// Timestamp of the newest retained event.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.events.last().map(|evidence| evidence.record.ts)
    }

    /// Sequence numbers of the retained events, oldest to newest.
    pub fn sequence_numbers(&self) -> impl Iterator<Item = u64> + '_ {
        self.events.iter().map(|evidence| evidence.seq)
    }
}

fn format_second(second: i64) -> String {
    match Utc.timestamp_opt(second, 0) {
        LocalResult::Single(instant) => instant.to_rfc3339(),
        _ => second.to_string(),
    }
}

impl fmt::Display for Burst {
    /// Render the burst for humans and logs.
    ///
    /// A burst with no evidence renders as the empty string, so callers
    /// may print unconditionally.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(first), Some(last)) = (self.events.first(), self.events.last()) else {
            return Ok(());
        };
        writeln!(f, "Key: {}", self.key)?;
        writeln!(
            f,
            "Interval: {} - {}",
            format_second(first.record.ts),
            format_second(last.record.ts)
        )?;
        let mut sep = "";
        for evidence in &self.events {
            write!(f, "{sep}{}", evidence.seq)?;
            sep = ", ";
        }
        Ok(())
    }
}
