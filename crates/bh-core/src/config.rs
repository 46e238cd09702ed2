//! Scan configuration and bounds.

use bh_common::Error;
use serde::{Deserialize, Serialize};

/// Minimum window length in seconds.
pub const MIN_INTERVAL: u32 = 10;

/// Maximum window length in seconds.
pub const MAX_INTERVAL: u32 = 1000;

/// Minimum number of occurrences that make a burst.
pub const MIN_COUNT: u32 = 2;

/// Threshold for one scanner: `count` occurrences within the trailing
/// `interval` seconds. Immutable for the lifetime of a scanner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Window length in seconds.
    pub interval: u32,
    /// Occurrences within the window that start a burst.
    pub count: u32,
}

impl ScanConfig {
    /// Check the configured bounds.
    pub fn validate(&self) -> Result<(), Error> {
        if self.interval < MIN_INTERVAL || self.interval > MAX_INTERVAL {
            return Err(Error::IntervalOutOfRange {
                min: MIN_INTERVAL,
                max: MAX_INTERVAL,
                got: self.interval,
            });
        }
        if self.count < MIN_COUNT {
            return Err(Error::CountTooSmall {
                min: MIN_COUNT,
                got: self.count,
            });
        }
        Ok(())
    }
}
