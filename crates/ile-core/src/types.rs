//! Core data types: log entries and the resolved watermark

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single monitoring log entry read from a log source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Event time in Unix epoch seconds
    pub timestamp: i64,
    /// Raw message text, emitted verbatim
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

/// Renders the line format consumed by the Thruk logcache: `[<ts>] <message>`
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message)
    }
}

/// Entries collected over one run, in append order
pub type LogEntries = Vec<LogEntry>;

/// Timestamp boundary below which entries are assumed already exported.
///
/// Computed once per run and shared read-only by every source fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(i64);

impl Watermark {
    /// "Fetch everything"
    pub const ZERO: Watermark = Watermark(0);

    /// Wrap an already-resolved threshold. Negative values clamp to zero.
    pub fn new(secs: i64) -> Self {
        Watermark(secs.max(0))
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// True when an entry with `timestamp` lies strictly after the watermark.
    pub fn admits(&self, timestamp: i64) -> bool {
        timestamp > self.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
