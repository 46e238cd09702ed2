//! Capture sources.
//!
//! A capture is a lazy, finite, forward-only sequence of events. The
//! scanner pulls events through the [`EventSource`] trait and never looks
//! at the underlying file; [`JsonlSource`] is the concrete adapter for
//! JSON Lines capture files, one event record per line.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A decoded capture record: a timestamp plus arbitrary named fields.
///
/// On the wire this is one flat JSON object, e.g.
/// `{"ts": 1722470400, "src": "10.0.0.1", "dst": "10.9.8.7"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event timestamp, seconds since the Unix epoch. Non-decreasing
    /// within a capture.
    pub ts: i64,

    /// Remaining fields of the record, keyed by name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// One event pulled from a capture source.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    /// Position of the event in its source, starting at 1.
    pub seq: u64,
    pub record: EventRecord,
}

/// Errors while reading a capture.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to open capture {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error reading capture: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode record #{seq}: {source}")]
    Decode {
        seq: u64,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of capture events.
///
/// `next_event` yields events in capture order; sequence numbers increase
/// by one per event, starting at 1. `Ok(None)` marks exhaustion. An error
/// is terminal for the source.
pub trait EventSource {
    fn next_event(&mut self) -> Result<Option<CapturedEvent>, ReadError>;
}

/// Reads event records from a JSON Lines capture.
///
/// Blank lines are skipped without consuming a sequence number. A line
/// that fails to decode is reported with the sequence number it would
/// have had.
pub struct JsonlSource<R> {
    reader: R,
    seq: u64,
    line: String,
}

impl JsonlSource<BufReader<File>> {
    /// Open a capture file.
    pub fn open(path: &Path) -> Result<Self, ReadError> {
        let file = File::open(path).map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlSource<R> {
    /// Wrap any buffered reader.
    pub fn new(reader: R) -> Self {
        JsonlSource {
            reader,
            seq: 0,
            line: String::new(),
        }
    }
}

impl<R: BufRead> EventSource for JsonlSource<R> {
    fn next_event(&mut self) -> Result<Option<CapturedEvent>, ReadError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            self.seq += 1;
            let record = serde_json::from_str(line).map_err(|source| ReadError::Decode {
                seq: self.seq,
                source,
            })?;
            return Ok(Some(CapturedEvent {
                seq: self.seq,
                record,
            }));
        }
    }
}
