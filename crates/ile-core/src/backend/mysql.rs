//! MySQL backend using sqlx
//!
//! One plain connection per descriptor. The connection is opened without a
//! default schema and every table is qualified with the configured database,
//! so a missing status schema shows up as "no status table" rather than as a
//! connection failure.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Connection, Row};
use tracing::debug;

use super::{Connector, EntryStream, LogSource, StatusStore, LOG_TABLE};
use crate::config::{DbDescriptor, Endpoint};
use crate::error::{IleError, IleResult};
use crate::types::{LogEntry, Watermark};

/// Opens sqlx MySQL connections bounded by the configured connect timeout
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    connect_timeout: Duration,
}

impl MySqlConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn options(descriptor: &DbDescriptor) -> IleResult<MySqlConnectOptions> {
        let mut options = MySqlConnectOptions::new()
            .username(&descriptor.user)
            .disable_statement_logging();
        if !descriptor.password.is_empty() {
            options = options.password(&descriptor.password);
        }
        Ok(match descriptor.endpoint()? {
            Endpoint::Tcp { host, port } => options.host(&host).port(port),
            Endpoint::Unix(path) => options.socket(path),
        })
    }

    async fn connect(&self, descriptor: &DbDescriptor) -> IleResult<MySqlConnection> {
        let options = Self::options(descriptor)?;
        let conn = with_deadline(self.connect_timeout, options.connect())
            .await?
            .map_err(|e| IleError::Connection(e.to_string()))?;
        debug!(target = %descriptor.label(), "connected");
        Ok(conn)
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn open_status_store(
        &self,
        descriptor: &DbDescriptor,
    ) -> IleResult<Box<dyn StatusStore>> {
        let conn = self.connect(descriptor).await?;
        Ok(Box::new(MySqlStatusStore { conn }))
    }

    async fn open_source(&self, descriptor: &DbDescriptor) -> IleResult<Box<dyn LogSource>> {
        let conn = self.connect(descriptor).await?;
        Ok(Box::new(MySqlLogSource {
            conn,
            ping_timeout: self.connect_timeout,
            sql: String::new(),
        }))
    }
}

struct MySqlStatusStore {
    conn: MySqlConnection,
}

#[async_trait]
impl StatusStore for MySqlStatusStore {
    async fn find_status_table(
        &mut self,
        database: &str,
        marker: &str,
    ) -> IleResult<Option<String>> {
        let pattern = format!("%{}%", escape_like(marker));
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
             WHERE table_schema = ? AND table_name LIKE ? \
             ORDER BY table_name LIMIT 1",
        )
        .bind(database)
        .bind(pattern)
        .fetch_optional(&mut self.conn)
        .await
        .map_err(|e| IleError::Query(e.to_string()))?;

        Ok(row.map(|(name,)| name))
    }

    async fn read_marker(
        &mut self,
        database: &str,
        table: &str,
        key: &str,
    ) -> IleResult<Option<String>> {
        let sql = format!(
            "SELECT CAST(value AS CHAR) FROM {}.{} WHERE name = ? LIMIT 1",
            quote_ident(database),
            quote_ident(table)
        );
        let row: Option<(Option<String>,)> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&mut self.conn)
            .await
            .map_err(|e| IleError::Query(e.to_string()))?;

        Ok(row.and_then(|(value,)| value))
    }
}

struct MySqlLogSource {
    conn: MySqlConnection,
    ping_timeout: Duration,
    // Owned here so the returned cursor can borrow it alongside the connection.
    sql: String,
}

#[async_trait]
impl LogSource for MySqlLogSource {
    async fn ping(&mut self) -> IleResult<()> {
        with_deadline(self.ping_timeout, self.conn.ping())
            .await?
            .map_err(|e| IleError::Ping(e.to_string()))
    }

    fn entries_since<'a>(
        &'a mut self,
        database: &'a str,
        watermark: Watermark,
    ) -> EntryStream<'a> {
        self.sql = format!(
            "SELECT CAST(UNIX_TIMESTAMP(logentry_time) AS SIGNED) AS timestamp, \
             logentry_data AS message \
             FROM {}.{} WHERE logentry_time > FROM_UNIXTIME(?)",
            quote_ident(database),
            quote_ident(LOG_TABLE)
        );

        let Self { conn, sql, .. } = self;
        // Errors before the first row mean the query itself failed.
        let mut seen_row = false;
        sqlx::query(sql.as_str())
            .bind(watermark.as_secs())
            .fetch(conn)
            .map(move |item| match item {
                Ok(row) => {
                    seen_row = true;
                    decode_row(&row)
                }
                Err(e) if seen_row => Err(IleError::Cursor(e.to_string())),
                Err(e) => Err(IleError::Query(e.to_string())),
            })
            .boxed()
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.conn.close().await {
            debug!(error = %e, "error while closing source connection");
        }
    }
}

fn decode_row(row: &MySqlRow) -> IleResult<LogEntry> {
    let timestamp: i64 = row
        .try_get(0)
        .map_err(|e| IleError::RowDecode(format!("timestamp: {}", e)))?;
    let message: String = row
        .try_get(1)
        .map_err(|e| IleError::RowDecode(format!("message: {}", e)))?;
    Ok(LogEntry { timestamp, message })
}

async fn with_deadline<T>(limit: Duration, fut: impl Future<Output = T>) -> IleResult<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| IleError::Timeout(limit))
}

/// Backtick-quote an identifier.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Escape LIKE wildcards so `value` matches literally.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
