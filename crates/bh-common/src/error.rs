//! Error types for Burst Hunter.
//!
//! This module provides structured error handling with:
//! - Category classification for error grouping
//! - Stable exit-code mapping for machine parsing
//!
//! Scanning errors are local to one capture source; the fan-out layer logs
//! them and keeps sibling scanners running. The variants here cover the
//! CLI-facing surface: argument validation, capture failures and the
//! timestamp-ordering contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Burst Hunter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Argument and configuration errors (bounds, malformed filters).
    Config,
    /// Capture reading and decoding errors.
    Capture,
    /// Broken caller contracts (timestamps presented out of order).
    Contract,
    /// File I/O errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Capture => write!(f, "capture"),
            ErrorCategory::Contract => write!(f, "contract"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for Burst Hunter.
#[derive(Error, Debug)]
pub enum Error {
    /// Window interval outside the supported bounds.
    #[error("interval must be between {min} and {max} seconds, got {got}")]
    IntervalOutOfRange { min: u32, max: u32, got: u32 },

    /// Burst threshold below the minimum.
    #[error("burst count must be at least {min}, got {got}")]
    CountTooSmall { min: u32, got: u32 },

    /// Key derivation needs at least one field name.
    #[error("at least one key field is required")]
    NoKeyFields,

    /// A `--require` filter that is not `field=value`.
    #[error("filter must look like field=value, got {got:?}")]
    MalformedFilter { got: String },

    /// No capture files were given.
    #[error("at least one capture file is required")]
    NoCaptures,

    /// A capture failed while scanning; the message carries the source
    /// context (path, sequence number).
    #[error("capture error: {0}")]
    Capture(String),

    /// The non-decreasing timestamp contract was broken upstream.
    #[error("timestamp ordering contract broken: {0}")]
    Contract(String),

    /// File I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error for grouping and reporting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::IntervalOutOfRange { .. }
            | Error::CountTooSmall { .. }
            | Error::NoKeyFields
            | Error::MalformedFilter { .. }
            | Error::NoCaptures => ErrorCategory::Config,
            Error::Capture(_) => ErrorCategory::Capture,
            Error::Contract(_) => ErrorCategory::Contract,
            Error::Io(_) => ErrorCategory::Io,
        }
    }
}
