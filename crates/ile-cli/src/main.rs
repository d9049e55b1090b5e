//! Icinga Log Exporter CLI
//!
//! Thin wrapper around ile-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Export new entries using ile_config.json next to the binary
//! ile > /tmp/log && thruk -a logcacheupdate --local /tmp/log
//!
//! # Use an explicit configuration file
//! ile -c /etc/ile/ile_config.json
//!
//! # Sort the merged output by timestamp, reading sources concurrently
//! ile --sort --concurrent
//!
//! # Show per-source progress on stderr
//! ile -v
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ile_core::config::default_config_path;
use ile_core::{run, AggregateOptions, Concurrency, Configuration, EntryOrder, MySqlConnector};

/// Icinga Log Exporter - merge Icinga log entries for the Thruk logcache
#[derive(Parser)]
#[command(name = "ile")]
#[command(version)]
#[command(about = "Icinga Log Exporter - merge Icinga log entries for the Thruk logcache")]
#[command(
    long_about = "Reads the last imported timestamp from the Thruk logcache status table, \
    fetches every newer entry from each configured Icinga database and prints them as \
    '[<epoch>] <message>' lines on stdout."
)]
struct Cli {
    /// Path of the configuration file (default: ile_config.json next to the binary)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Sort merged entries by timestamp instead of grouping by source
    #[arg(long)]
    sort: bool,

    /// Read all sources concurrently
    #[arg(long)]
    concurrent: bool,
}

impl Cli {
    fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            order: if self.sort {
                EntryOrder::ByTimestamp
            } else {
                EntryOrder::BySource
            },
            concurrency: if self.concurrent {
                Concurrency::Concurrent
            } else {
                Concurrency::Sequential
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Configuration::load(&config_path)?;
    let connector = MySqlConnector::new(config.connect_timeout()?);

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    run(&connector, &config, cli.aggregate_options(), &mut out)
        .await
        .context("Cannot write log entries to stdout")?;
    out.flush().context("Cannot write log entries to stdout")?;

    Ok(())
}

/// Log to stderr; stdout carries only exported entries.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_options() {
        let cli = Cli::parse_from(["ile"]);
        assert!(cli.config.is_none());
        assert_eq!(cli.aggregate_options(), AggregateOptions::default());
    }

    #[test]
    fn test_flags_map_to_options() {
        let cli = Cli::parse_from(["ile", "-c", "/etc/ile.json", "--sort", "--concurrent", "-vv"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/ile.json")));
        assert_eq!(cli.verbose, 2);
        let options = cli.aggregate_options();
        assert_eq!(options.order, EntryOrder::ByTimestamp);
        assert_eq!(options.concurrency, Concurrency::Concurrent);
    }
}
