//! Exporter configuration
//!
//! The configuration file is JSON with one status-store descriptor and any
//! number of log-source descriptors:
//!
//! ```json
//! {
//!   "timeout": "5s",
//!   "thruk_db": { "dsn": "tcp(127.0.0.1:3306)", "db": "thruk", "user": "thruk", "password": "secret" },
//!   "icinga_db": [
//!     { "dsn": "tcp(icinga1:3306)", "db": "icinga", "user": "icinga", "password": "secret" }
//!   ]
//! }
//! ```
//!
//! `dsn` accepts `tcp(host:port)`, `unix(/path/to/socket)` or a bare
//! `host[:port]`. The timeout is a Go-style duration string.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IleError, IleResult};

/// Default file name, looked up next to the executable
pub const DEFAULT_CONFIG_FILE: &str = "ile_config.json";

/// MySQL default port when a descriptor omits it
pub const DEFAULT_PORT: u16 = 3306;

/// Deadline for each query round-trip and each row read
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection parameters for one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbDescriptor {
    /// Network address, e.g. `tcp(host:3306)`
    pub dsn: String,
    /// Database (schema) name
    pub db: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

/// Where a descriptor points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl DbDescriptor {
    /// Parse the `dsn` field into an endpoint.
    pub fn endpoint(&self) -> IleResult<Endpoint> {
        let dsn = self.dsn.trim();
        if dsn.is_empty() {
            return Err(IleError::Descriptor("empty dsn".to_string()));
        }

        if let Some(path) = strip_wrapper(dsn, "unix") {
            if path.is_empty() {
                return Err(IleError::Descriptor(format!("empty socket path in '{}'", dsn)));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        let address = strip_wrapper(dsn, "tcp").unwrap_or(dsn);
        let (host, port) = split_host_port(address)
            .ok_or_else(|| IleError::Descriptor(format!("malformed address '{}'", dsn)))?;
        Ok(Endpoint::Tcp {
            host: host.to_string(),
            port,
        })
    }

    /// Short label used in log lines; never contains credentials.
    pub fn label(&self) -> String {
        format!("{}/{}", self.dsn, self.db)
    }
}

fn strip_wrapper<'a>(dsn: &'a str, scheme: &str) -> Option<&'a str> {
    dsn.strip_prefix(scheme)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn split_host_port(address: &str) -> Option<(&str, u16)> {
    // [v6]:port or [v6]
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return match tail {
            "" => Some((host, DEFAULT_PORT)),
            _ => Some((host, tail.strip_prefix(':')?.parse().ok()?)),
        };
    }

    match address.rsplit_once(':') {
        Some((host, _)) if host.is_empty() => None,
        Some((host, port)) => Some((host, port.parse().ok()?)),
        None => Some((address, DEFAULT_PORT)),
    }
}

/// Parsed configuration, immutable for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Connect timeout shared by every connection
    pub timeout: String,
    /// Status store holding the last processed timestamp
    #[serde(rename = "thruk_db")]
    pub status_store: DbDescriptor,
    /// Log sources, read in this order
    #[serde(rename = "icinga_db", default)]
    pub sources: Vec<DbDescriptor>,
}

impl Configuration {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> IleResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IleError::Config(format!("config file missing '{}': {}", path.display(), e))
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            IleError::Config(msg) => {
                IleError::Config(format!("config parse error '{}': {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse and validate configuration JSON.
    pub fn from_json(raw: &str) -> IleResult<Self> {
        let config: Configuration = serde_json::from_str(raw)?;
        config.connect_timeout()?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> IleResult<Duration> {
        parse_duration(&self.timeout)
    }
}

/// Default configuration path: `ile_config.json` beside the executable.
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_CONFIG_FILE)
}

/// Parse a Go-style duration (`"5s"`, `"1m30s"`, `"250ms"`, `"1.5h"`).
///
/// A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> IleResult<Duration> {
    let s = input.trim();
    let invalid = || IleError::Config(format!("invalid timeout '{}'", input));

    if s.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if num_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..num_len].parse().map_err(|_| invalid())?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        total += value * scale;
        rest = &rest[unit_len..];
    }

    Duration::try_from_secs_f64(total).map_err(|_| invalid())
}
