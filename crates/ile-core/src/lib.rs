//! Icinga Log Exporter Core Library
//!
//! Merges monitoring log entries from several independent Icinga IDO
//! databases into one stream for the Thruk logcache.
//!
//! ## Overview
//!
//! Each run reads the last imported timestamp from the Thruk status table,
//! rewinds it by a safety margin, fetches every newer entry from each
//! configured source in turn and prints them as `[<epoch>] <message>` lines.
//! Nothing is persisted; the next run re-derives the watermark.
//!
//! ## Failure tiers
//!
//! - **Fatal**: missing or unparseable configuration, output write failure
//! - **Degraded**: no usable watermark, full history is exported
//! - **Per-source**: unreachable or failing source contributes nothing
//! - **Per-row**: undecodable row is dropped
//!
//! ## Quick Start
//!
//! ```ignore
//! use ile_core::{run, AggregateOptions, Configuration, MySqlConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Configuration::load("ile_config.json")?;
//!     let connector = MySqlConnector::new(config.connect_timeout()?);
//!     run(&connector, &config, AggregateOptions::default(), std::io::stdout().lock()).await?;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod backend;
pub mod config;
pub mod emit;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod step;
pub mod types;
pub mod watermark;

// Re-exports
pub use aggregate::{aggregate, Aggregate, AggregateOptions, Concurrency, EntryOrder};
pub use backend::{Connector, LogSource, MySqlConnector, StatusStore};
pub use config::{Configuration, DbDescriptor};
pub use emit::emit;
pub use error::{IleError, IleResult};
pub use pipeline::{run, RunSummary};
pub use source::{fetch, FetchOutcome, SourceReport};
pub use step::Step;
pub use types::{LogEntries, LogEntry, Watermark};
pub use watermark::{resolve, SAFETY_MARGIN_SECS};
