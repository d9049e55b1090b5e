//! Reading new entries from a single log source
//!
//! A source contributes whatever it can: connection, liveness or query
//! failures skip the source, a broken cursor keeps the rows read so far,
//! and an undecodable row is dropped on its own.

use std::fmt;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::backend::Connector;
use crate::config::{DbDescriptor, READ_TIMEOUT};
use crate::error::IleError;
use crate::step::Step;
use crate::types::{LogEntries, Watermark};

/// How a source fetch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Cursor ran to the end
    Complete,
    /// Cursor failed mid-way; rows read before the failure are kept
    Partial(String),
    /// Nothing was read (connect, ping or query failure)
    Skipped(String),
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Complete => write!(f, "complete"),
            FetchOutcome::Partial(reason) => write!(f, "partial: {}", reason),
            FetchOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// Result of reading one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    /// `dsn/db` label of the source
    pub source: String,
    /// Entries in query order
    pub entries: LogEntries,
    /// Rows dropped because they could not be decoded
    pub skipped_rows: usize,
    pub outcome: FetchOutcome,
}

impl SourceReport {
    fn skipped(descriptor: &DbDescriptor, reason: String) -> Self {
        Self {
            source: descriptor.label(),
            entries: Vec::new(),
            skipped_rows: 0,
            outcome: FetchOutcome::Skipped(reason),
        }
    }
}

/// Fetch all entries of `descriptor` newer than `watermark`.
///
/// Never fails: problems are logged and reflected in the report's outcome.
pub async fn fetch(
    connector: &dyn Connector,
    descriptor: &DbDescriptor,
    watermark: Watermark,
) -> SourceReport {
    let label = descriptor.label();

    let mut conn = match Step::from_result(connector.open_source(descriptor).await) {
        Step::Ok(conn) => conn,
        step => {
            let reason = step.reason().unwrap_or_default().to_string();
            warn!(source = %label, %reason, "cannot connect to log source, skipping");
            return SourceReport::skipped(descriptor, reason);
        }
    };

    if let Err(e) = conn.ping().await {
        warn!(source = %label, error = %e, "log source not responding, skipping");
        return SourceReport::skipped(descriptor, e.to_string());
    }

    let mut entries = Vec::new();
    let mut skipped_rows = 0;
    let mut outcome = FetchOutcome::Complete;
    {
        let mut rows = conn.entries_since(&descriptor.db, watermark);
        loop {
            let item = match tokio::time::timeout(READ_TIMEOUT, rows.next()).await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(_) => Err(IleError::Timeout(READ_TIMEOUT)),
            };
            match item {
                Ok(entry) => entries.push(entry),
                Err(e) if e.is_row_level() => {
                    skipped_rows += 1;
                    warn!(source = %label, error = %e, "error parsing result row, dropping it");
                }
                // Nothing read yet: the query itself failed or never answered.
                Err(e @ (IleError::Query(_) | IleError::Timeout(_)))
                    if entries.is_empty() && skipped_rows == 0 =>
                {
                    warn!(source = %label, error = %e, "error getting log entries, skipping");
                    return SourceReport::skipped(descriptor, e.to_string());
                }
                Err(e) => {
                    warn!(
                        source = %label,
                        error = %e,
                        kept = entries.len(),
                        "error in result row iteration, keeping partial result"
                    );
                    outcome = FetchOutcome::Partial(e.to_string());
                    break;
                }
            }
        }
    }

    conn.close().await;
    debug!(source = %label, entries = entries.len(), "source read finished");

    SourceReport {
        source: label,
        entries,
        skipped_rows,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryConnector, MemorySource};
    use crate::types::LogEntry;

    fn icinga(dsn: &str) -> DbDescriptor {
        DbDescriptor {
            dsn: dsn.to_string(),
            db: "icinga".to_string(),
            user: "icinga".to_string(),
            password: "pw".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_complete() {
        let connector = MemoryConnector::new().with_source(
            "a",
            MemorySource::new()
                .with_entry(650, "old")
                .with_entry(1205, "new one")
                .with_entry(1300, "newer"),
        );
        let report = fetch(&connector, &icinga("a"), Watermark::new(700)).await;

        assert_eq!(report.outcome, FetchOutcome::Complete);
        assert_eq!(
            report.entries,
            vec![LogEntry::new(1205, "new one"), LogEntry::new(1300, "newer")]
        );
        assert_eq!(report.source, "a/icinga");
        assert_eq!(connector.graceful_closes(), 1);
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_fetch_passes_watermark_and_database() {
        let connector = MemoryConnector::new().with_source("a", MemorySource::new());
        fetch(&connector, &icinga("a"), Watermark::new(42)).await;

        let queries = connector.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].database, "icinga");
        assert_eq!(queries[0].watermark, Watermark::new(42));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_skipped() {
        let connector = MemoryConnector::new();
        let report = fetch(&connector, &icinga("gone"), Watermark::ZERO).await;
        assert!(matches!(report.outcome, FetchOutcome::Skipped(_)));
        assert!(report.entries.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_ping_failure_releases_connection() {
        let connector = MemoryConnector::new()
            .with_source("a", MemorySource::new().with_entry(1, "x").failing_ping());
        let report = fetch(&connector, &icinga("a"), Watermark::ZERO).await;

        assert!(matches!(report.outcome, FetchOutcome::Skipped(_)));
        assert!(connector.queries().is_empty());
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_fetch_query_failure_is_skipped() {
        let connector = MemoryConnector::new()
            .with_source("a", MemorySource::new().with_entry(1, "x").failing_query());
        let report = fetch(&connector, &icinga("a"), Watermark::ZERO).await;

        assert!(matches!(report.outcome, FetchOutcome::Skipped(_)));
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_fetch_drops_malformed_rows() {
        let connector = MemoryConnector::new().with_source(
            "a",
            MemorySource::new()
                .with_entry(10, "first")
                .with_malformed("NULL message")
                .with_entry(20, "second"),
        );
        let report = fetch(&connector, &icinga("a"), Watermark::ZERO).await;

        assert_eq!(report.outcome, FetchOutcome::Complete);
        assert_eq!(report.skipped_rows, 1);
        assert_eq!(
            report.entries,
            vec![LogEntry::new(10, "first"), LogEntry::new(20, "second")]
        );
    }

    #[tokio::test]
    async fn test_fetch_keeps_partial_on_cursor_failure() {
        let connector = MemoryConnector::new().with_source(
            "a",
            MemorySource::new()
                .with_entry(10, "first")
                .with_entry(20, "second")
                .with_entry(30, "third")
                .failing_cursor_after(2),
        );
        let report = fetch(&connector, &icinga("a"), Watermark::ZERO).await;

        assert!(matches!(report.outcome, FetchOutcome::Partial(_)));
        assert_eq!(report.entries.len(), 2);
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_stalled_cursor_keeps_rows_read() {
        let connector = MemoryConnector::new().with_source(
            "a",
            MemorySource::new()
                .with_entry(10, "first")
                .with_entry(20, "second")
                .with_entry(30, "third")
                .stalling_after(2),
        );
        let started = tokio::time::Instant::now();
        let report = fetch(&connector, &icinga("a"), Watermark::ZERO).await;

        assert_eq!(
            report.outcome,
            FetchOutcome::Partial(IleError::Timeout(READ_TIMEOUT).to_string())
        );
        assert_eq!(
            report.entries,
            vec![LogEntry::new(10, "first"), LogEntry::new(20, "second")]
        );
        assert!(started.elapsed() >= READ_TIMEOUT);
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_query_that_never_answers_is_skipped() {
        let connector = MemoryConnector::new().with_source(
            "a",
            MemorySource::new().with_entry(10, "first").stalling_after(0),
        );
        let report = fetch(&connector, &icinga("a"), Watermark::ZERO).await;

        assert!(matches!(report.outcome, FetchOutcome::Skipped(_)));
        assert!(report.entries.is_empty());
        assert_eq!(connector.open_connections(), 0);
    }
}
