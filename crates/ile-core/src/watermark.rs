//! Watermark resolution against the status store
//!
//! The status store owns a `*_status` table whose `last_update` row holds
//! the epoch second of the last entry it ingested. The resolved watermark
//! is that value minus a fixed safety margin, so entries committed late
//! around the boundary are fetched again; the consumer tolerates duplicates.
//!
//! Any failure on the way (unreachable store, no status table, unreadable
//! or non-numeric value) degrades to `Watermark::ZERO`, i.e. full history.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::backend::Connector;
use crate::config::{DbDescriptor, READ_TIMEOUT};
use crate::error::{IleError, IleResult};
use crate::step::Step;
use crate::types::Watermark;

/// Rewind applied to the stored marker, in seconds
pub const SAFETY_MARGIN_SECS: i64 = 300;

/// Substring identifying the status table in the status database
pub const STATUS_TABLE_MARKER: &str = "_status";

/// Key of the row holding the last processed timestamp
pub const LAST_UPDATE_KEY: &str = "last_update";

impl Watermark {
    /// Apply the safety margin to a raw marker value.
    ///
    /// `raw > 0` yields `raw - 300` (never below zero); anything else yields zero.
    /// The threshold is clamped because `FROM_UNIXTIME` of a negative value is
    /// `NULL`, which would match no rows at all.
    pub fn from_marker(raw: i64) -> Self {
        if raw > 0 {
            Watermark::new(raw.saturating_sub(SAFETY_MARGIN_SECS))
        } else {
            Watermark::ZERO
        }
    }
}

/// Parse a stored marker the way the status store writes it: a decimal integer.
pub fn parse_marker(raw: &str) -> Step<i64> {
    match raw.trim().parse::<i64>() {
        Ok(value) => Step::Ok(value),
        Err(e) => Step::Skipped(format!("marker value '{}' is not an integer: {}", raw, e)),
    }
}

/// Look up the watermark for this run.
pub async fn resolve(connector: &dyn Connector, descriptor: &DbDescriptor) -> Watermark {
    match lookup_marker(connector, descriptor).await {
        Step::Ok(raw) => {
            let watermark = Watermark::from_marker(raw);
            info!(
                store = %descriptor.label(),
                marker = raw,
                watermark = watermark.as_secs(),
                "resolved watermark"
            );
            watermark
        }
        step => {
            warn!(
                store = %descriptor.label(),
                reason = step.reason().unwrap_or_default(),
                "no watermark found, exporting full history"
            );
            Watermark::ZERO
        }
    }
}

async fn lookup_marker(connector: &dyn Connector, descriptor: &DbDescriptor) -> Step<i64> {
    let mut store = match Step::from_result(connector.open_status_store(descriptor).await) {
        Step::Ok(store) => store,
        Step::Skipped(reason) => return Step::Skipped(reason),
        Step::Fatal(reason) => return Step::Fatal(reason),
    };

    let table = match Step::from_option(
        within_read_timeout(store.find_status_table(&descriptor.db, STATUS_TABLE_MARKER)).await,
        "status table not found",
    ) {
        Step::Ok(table) => table,
        other => return other.map(|_| 0),
    };
    debug!(table = %table, "found status table");

    Step::from_option(
        within_read_timeout(store.read_marker(&descriptor.db, &table, LAST_UPDATE_KEY)).await,
        "last_update marker not set",
    )
    .and_then(|raw| parse_marker(&raw))
}

async fn within_read_timeout<T>(query: impl Future<Output = IleResult<T>>) -> IleResult<T> {
    tokio::time::timeout(READ_TIMEOUT, query)
        .await
        .unwrap_or(Err(IleError::Timeout(READ_TIMEOUT)))
}
