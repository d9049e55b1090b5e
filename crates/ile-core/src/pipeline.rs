//! One export run: watermark, then sources, then output
//!
//! ```text
//! Configuration ──► resolve watermark ──► aggregate sources ──► emit
//!                   (degrades to 0)       (skips failed ones)   (fatal on sink error)
//! ```

use std::io::Write;

use tracing::info;

use crate::aggregate::{aggregate, AggregateOptions};
use crate::backend::Connector;
use crate::config::Configuration;
use crate::emit::emit;
use crate::error::IleResult;
use crate::source::SourceReport;
use crate::types::Watermark;
use crate::watermark::resolve;

/// What a run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub watermark: Watermark,
    /// Per-source reports in configuration order
    pub sources: Vec<SourceReport>,
    pub entries_written: usize,
}

/// Export all entries newer than the status store's watermark to `sink`.
///
/// Only a sink failure is returned as an error; every database problem is
/// logged and degrades the output instead.
pub async fn run<W: Write>(
    connector: &dyn Connector,
    config: &Configuration,
    options: AggregateOptions,
    sink: W,
) -> IleResult<RunSummary> {
    let watermark = resolve(connector, &config.status_store).await;
    let combined = aggregate(connector, &config.sources, watermark, options).await;
    let entries_written = emit(&combined.entries, sink)?;

    info!(
        watermark = watermark.as_secs(),
        sources = config.sources.len(),
        entries = entries_written,
        "export finished"
    );

    Ok(RunSummary {
        watermark,
        sources: combined.reports,
        entries_written,
    })
}
