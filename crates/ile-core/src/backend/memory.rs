//! In-memory backend
//!
//! Hosts are keyed by their `dsn`; a descriptor whose `dsn` is not registered
//! behaves like an unreachable server. Each host can be told to fail at a
//! specific point (connect, ping, query, mid-cursor) or stall so the pipeline's
//! degradation rules can be exercised without a database server.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;

use super::{Connector, EntryStream, LogSource, StatusStore};
use crate::config::DbDescriptor;
use crate::error::{IleError, IleResult};
use crate::types::{LogEntry, Watermark};

/// A stored row; `Malformed` rows fail to decode when read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryRow {
    Entry(LogEntry),
    Malformed(String),
}

/// Scripted status store: database -> table -> key -> value
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    databases: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
    fail_catalog: bool,
    fail_read: bool,
    stall_catalog: bool,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, database: &str, table: &str, rows: &[(&str, &str)]) -> Self {
        let table = self
            .databases
            .entry(database.to_string())
            .or_default()
            .entry(table.to_string())
            .or_default();
        for (key, value) in rows {
            table.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Catalog lookups fail with a query error.
    pub fn failing_catalog(mut self) -> Self {
        self.fail_catalog = true;
        self
    }

    /// Catalog lookups never answer.
    pub fn stalling_catalog(mut self) -> Self {
        self.stall_catalog = true;
        self
    }

    /// Marker reads fail with a query error.
    pub fn failing_read(mut self) -> Self {
        self.fail_read = true;
        self
    }
}

/// Scripted log source
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Vec<MemoryRow>,
    fail_ping: bool,
    fail_query: bool,
    fail_cursor_after: Option<usize>,
    stall_after: Option<usize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, timestamp: i64, message: &str) -> Self {
        self.rows.push(MemoryRow::Entry(LogEntry::new(timestamp, message)));
        self
    }

    pub fn with_malformed(mut self, reason: &str) -> Self {
        self.rows.push(MemoryRow::Malformed(reason.to_string()));
        self
    }

    pub fn failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    pub fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }

    /// The cursor breaks after yielding `rows` rows.
    pub fn failing_cursor_after(mut self, rows: usize) -> Self {
        self.fail_cursor_after = Some(rows);
        self
    }

    /// The cursor yields `rows` rows, then never produces another item.
    pub fn stalling_after(mut self, rows: usize) -> Self {
        self.stall_after = Some(rows);
        self
    }
}

/// A range query observed by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub dsn: String,
    pub database: String,
    pub watermark: Watermark,
}

#[derive(Default)]
struct Recorder {
    queries: Mutex<Vec<RecordedQuery>>,
    open: AtomicUsize,
    closed_gracefully: AtomicUsize,
}

/// Connector over in-memory hosts
#[derive(Clone, Default)]
pub struct MemoryConnector {
    status_stores: HashMap<String, MemoryStatusStore>,
    sources: HashMap<String, MemorySource>,
    recorder: Arc<Recorder>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status_store(mut self, dsn: &str, store: MemoryStatusStore) -> Self {
        self.status_stores.insert(dsn.to_string(), store);
        self
    }

    pub fn with_source(mut self, dsn: &str, source: MemorySource) -> Self {
        self.sources.insert(dsn.to_string(), source);
        self
    }

    /// Range queries issued so far, in order.
    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.recorder.queries.lock().clone()
    }

    /// Connections currently alive (opened and not yet dropped).
    pub fn open_connections(&self) -> usize {
        self.recorder.open.load(Ordering::SeqCst)
    }

    /// Source connections released through `close`.
    pub fn graceful_closes(&self) -> usize {
        self.recorder.closed_gracefully.load(Ordering::SeqCst)
    }

    fn lease(&self) -> Lease {
        self.recorder.open.fetch_add(1, Ordering::SeqCst);
        Lease {
            recorder: self.recorder.clone(),
        }
    }
}

/// Counts a live connection until dropped.
struct Lease {
    recorder: Arc<Recorder>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.recorder.open.fetch_sub(1, Ordering::SeqCst);
    }
}

fn unreachable(descriptor: &DbDescriptor) -> IleError {
    IleError::Connection(format!("no route to {}", descriptor.dsn))
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open_status_store(
        &self,
        descriptor: &DbDescriptor,
    ) -> IleResult<Box<dyn StatusStore>> {
        let store = self
            .status_stores
            .get(&descriptor.dsn)
            .cloned()
            .ok_or_else(|| unreachable(descriptor))?;
        Ok(Box::new(MemoryStatusConn {
            store,
            _lease: self.lease(),
        }))
    }

    async fn open_source(&self, descriptor: &DbDescriptor) -> IleResult<Box<dyn LogSource>> {
        let source = self
            .sources
            .get(&descriptor.dsn)
            .cloned()
            .ok_or_else(|| unreachable(descriptor))?;
        Ok(Box::new(MemorySourceConn {
            dsn: descriptor.dsn.clone(),
            source,
            lease: self.lease(),
        }))
    }
}

struct MemoryStatusConn {
    store: MemoryStatusStore,
    _lease: Lease,
}

#[async_trait]
impl StatusStore for MemoryStatusConn {
    async fn find_status_table(
        &mut self,
        database: &str,
        marker: &str,
    ) -> IleResult<Option<String>> {
        if self.store.stall_catalog {
            futures::future::pending::<()>().await;
        }
        if self.store.fail_catalog {
            return Err(IleError::Query("information_schema unavailable".into()));
        }
        Ok(self.store.databases.get(database).and_then(|tables| {
            tables
                .keys()
                .find(|name| name.contains(marker))
                .cloned()
        }))
    }

    async fn read_marker(
        &mut self,
        database: &str,
        table: &str,
        key: &str,
    ) -> IleResult<Option<String>> {
        if self.store.fail_read {
            return Err(IleError::Query(format!("cannot read {}.{}", database, table)));
        }
        let rows = self
            .store
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .ok_or_else(|| IleError::Query(format!("table {}.{} doesn't exist", database, table)))?;
        Ok(rows.get(key).cloned())
    }
}

struct MemorySourceConn {
    dsn: String,
    source: MemorySource,
    lease: Lease,
}

#[async_trait]
impl LogSource for MemorySourceConn {
    async fn ping(&mut self) -> IleResult<()> {
        if self.source.fail_ping {
            return Err(IleError::Ping(format!("{} went away", self.dsn)));
        }
        Ok(())
    }

    fn entries_since<'a>(
        &'a mut self,
        database: &'a str,
        watermark: Watermark,
    ) -> EntryStream<'a> {
        self.lease.recorder.queries.lock().push(RecordedQuery {
            dsn: self.dsn.clone(),
            database: database.to_string(),
            watermark,
        });

        if self.source.fail_query {
            let err = IleError::Query(format!("{}.icinga_logentries doesn't exist", database));
            return futures::stream::iter(vec![Err(err)]).boxed();
        }

        let mut items: Vec<IleResult<LogEntry>> = self
            .source
            .rows
            .iter()
            .filter_map(|row| match row {
                MemoryRow::Entry(entry) if watermark.admits(entry.timestamp) => {
                    Some(Ok(entry.clone()))
                }
                MemoryRow::Entry(_) => None,
                MemoryRow::Malformed(reason) => Some(Err(IleError::RowDecode(reason.clone()))),
            })
            .collect();

        if let Some(limit) = self.source.fail_cursor_after {
            items.truncate(limit);
            items.push(Err(IleError::Cursor("connection reset by peer".into())));
        }

        if let Some(limit) = self.source.stall_after {
            items.truncate(limit);
            return futures::stream::iter(items)
                .chain(futures::stream::pending())
                .boxed();
        }

        futures::stream::iter(items).boxed()
    }

    async fn close(self: Box<Self>) {
        self.lease
            .recorder
            .closed_gracefully
            .fetch_add(1, Ordering::SeqCst);
    }
}
