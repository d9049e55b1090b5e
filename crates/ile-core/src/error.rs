//! Error types for the log exporter

use thiserror::Error;

/// Main error type for exporter operations
#[derive(Error, Debug)]
pub enum IleError {
    /// Configuration file missing, unreadable or malformed
    #[error("Config error: {0}")]
    Config(String),

    /// Descriptor could not be turned into connection parameters
    #[error("Invalid descriptor: {0}")]
    Descriptor(String),

    /// Connection could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection was established but the liveness check failed
    #[error("Ping failed: {0}")]
    Ping(String),

    /// Query could not be executed
    #[error("Query error: {0}")]
    Query(String),

    /// A single result row could not be decoded
    #[error("Row decode error: {0}")]
    RowDecode(String),

    /// The result cursor failed while being enumerated
    #[error("Cursor error: {0}")]
    Cursor(String),

    /// An operation did not finish within its deadline
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Output sink failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IleError {
    /// True for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IleError::Config(_) | IleError::Io(_))
    }

    /// True for errors that affect only the current row of a cursor.
    pub fn is_row_level(&self) -> bool {
        matches!(self, IleError::RowDecode(_))
    }
}

impl From<serde_json::Error> for IleError {
    fn from(err: serde_json::Error) -> Self {
        IleError::Config(err.to_string())
    }
}

/// Result type alias using IleError
pub type IleResult<T> = Result<T, IleError>;
