//! Connection seam between the export pipeline and the databases
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Connector (one per run)                                        │
//! │  ├── open_status_store(descriptor) -> Box<dyn StatusStore>      │
//! │  │   ├── find_status_table(database, marker)                    │
//! │  │   └── read_marker(database, table, key)                      │
//! │  └── open_source(descriptor) -> Box<dyn LogSource>              │
//! │      ├── ping()                                                 │
//! │      ├── entries_since(database, watermark) -> EntryStream      │
//! │      └── close()                                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Connections are owned values: dropping one releases it, so every early
//! return in the pipeline releases its connection without extra bookkeeping.
//!
//! - `mysql.rs`  -> sqlx-backed implementation used by the binary
//! - `memory.rs` -> in-memory implementation with scriptable failures

mod memory;
mod mysql;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::DbDescriptor;
use crate::error::IleResult;
use crate::types::{LogEntry, Watermark};

pub use memory::{MemoryConnector, MemoryRow, MemorySource, MemoryStatusStore, RecordedQuery};
pub use mysql::MySqlConnector;

/// Table every log source keeps its entries in
pub const LOG_TABLE: &str = "icinga_logentries";

/// Cursor over log entries newer than a watermark.
///
/// A `RowDecode` error affects only that item; any other error ends the cursor.
pub type EntryStream<'a> = BoxStream<'a, IleResult<LogEntry>>;

/// Opens connections for descriptors taken from the configuration
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to the status store.
    async fn open_status_store(&self, descriptor: &DbDescriptor)
        -> IleResult<Box<dyn StatusStore>>;

    /// Connect to a log source. Liveness is checked separately with `ping`.
    async fn open_source(&self, descriptor: &DbDescriptor) -> IleResult<Box<dyn LogSource>>;
}

/// Read-only access to the store that records the last processed timestamp
#[async_trait]
pub trait StatusStore: Send {
    /// First table (by name) in `database` whose name contains `marker`.
    async fn find_status_table(&mut self, database: &str, marker: &str)
        -> IleResult<Option<String>>;

    /// Raw value stored under `key` in `table`, if any.
    async fn read_marker(
        &mut self,
        database: &str,
        table: &str,
        key: &str,
    ) -> IleResult<Option<String>>;
}

/// One live connection to a log source
#[async_trait]
pub trait LogSource: Send {
    /// Liveness check.
    async fn ping(&mut self) -> IleResult<()>;

    /// Entries with an event time strictly after `watermark`, in query order.
    fn entries_since<'a>(&'a mut self, database: &'a str, watermark: Watermark)
        -> EntryStream<'a>;

    /// Release the connection gracefully.
    async fn close(self: Box<Self>);
}
